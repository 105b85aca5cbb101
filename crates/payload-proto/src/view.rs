//! View projection: which catalog entries to show, with which badges.
//!
//! Pure functions only; nothing here touches the store or the engine.

use crate::catalog::{Catalog, PayloadDescriptor};
use crate::store::StateSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadView<'a> {
    pub payload: &'a PayloadDescriptor,
    pub is_favorite: bool,
    pub is_recent: bool,
    pub is_selected: bool,
    pub image: Option<String>,
}

/// Case-insensitive substring match of the whole query against name or
/// description. An empty query matches everything.
pub fn matches(payload: &PayloadDescriptor, query: &str) -> bool {
    let q = query.to_lowercase();
    payload.name.to_lowercase().contains(&q) || payload.description.to_lowercase().contains(&q)
}

/// Filter the catalog by `query`, in catalog order, and attach badges.
pub fn project<'a>(
    catalog: &'a Catalog,
    query: &str,
    state: &StateSnapshot,
    selected: Option<&str>,
) -> Vec<PayloadView<'a>> {
    catalog
        .list_all()
        .iter()
        .filter(|p| matches(p, query))
        .map(|p| PayloadView {
            payload: p,
            is_favorite: state.is_favorite(&p.name),
            is_recent: state.is_recent(&p.name),
            is_selected: selected == Some(p.name.as_str()),
            image: catalog.resolve_image(&p.name),
        })
        .collect()
}
