pub mod header;
pub mod help_overlay;
pub mod payload_list;
