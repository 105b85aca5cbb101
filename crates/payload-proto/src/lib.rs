//! Payload dispatch core: catalog, persisted favorites/recents, the dispatch
//! engine and the controller that front ends drive.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod event;
pub mod platform;
pub mod store;
pub mod view;

pub use catalog::{Catalog, PayloadDescriptor};
pub use controller::{Controller, ControllerSnapshot};
pub use dispatch::{DispatchEngine, DispatchError, DispatchOutcome, DispatchPhase, DispatchStatus};
pub use event::{CoreEvent, Notice, NoticeLevel, Notifier};
pub use store::{FileBackend, MemoryBackend, StateBackend, StateSnapshot, StateStore, StoreError};
