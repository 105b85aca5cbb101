//! Selection and favorite controller. Turns user intents into core calls.
//!
//! The visual selection marker lives here, apart from the engine's
//! `DispatchStatus`. It is set the moment an intent arrives and is not
//! reverted when the transfer later fails, so the two may disagree.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::dispatch::{DispatchEngine, DispatchOutcome, DispatchStatus};
use crate::event::Notifier;
use crate::store::{FavoriteToggle, StateSnapshot, StateStore, Written};

/// Everything a front end needs to draw the current state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub state: StateSnapshot,
    pub dispatch: DispatchStatus,
    /// Visually selected payload.
    pub selected: Option<String>,
}

pub struct Controller {
    catalog: Arc<Catalog>,
    engine: Arc<DispatchEngine>,
    store: Arc<StateStore>,
    notifier: Notifier,
    selected: RwLock<Option<String>>,
}

impl Controller {
    pub fn new(
        catalog: Arc<Catalog>,
        engine: Arc<DispatchEngine>,
        store: Arc<StateStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            catalog,
            engine,
            store,
            notifier,
            selected: RwLock::new(None),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn selected(&self) -> Option<String> {
        self.selected.read().await.clone()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.store.snapshot().await,
            dispatch: self.engine.status().await,
            selected: self.selected().await,
        }
    }

    /// Mark `name` selected and start sending it.
    ///
    /// The dispatch is begun before this returns, so back-to-back intents are
    /// tracked in the order they were issued. The transfer itself runs on its
    /// own task; earlier transfers still in flight are left alone.
    pub async fn select_and_send(&self, name: &str) -> JoinHandle<DispatchOutcome> {
        if !self.catalog.contains(name) {
            warn!("select_and_send: {} is not in the catalog", name);
        }
        *self.selected.write().await = Some(name.to_string());
        debug!("selected {}", name);

        let ticket = self.engine.begin(name).await;
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move { engine.run(ticket).await })
    }

    /// Flip the favorite flag on `name` and announce the result.
    pub async fn toggle_favorite(&self, name: &str) -> Written<FavoriteToggle> {
        let written = self.store.toggle_favorite(name).await;
        let verb = if written.value.is_favorite {
            "added to"
        } else {
            "removed from"
        };
        let message = format!("{} {} favorites", name, verb);
        match (&written.persisted, written.value.is_favorite) {
            (Err(_), _) => self.notifier.warning(format!("{} (not saved)", message)),
            (Ok(()), true) => self.notifier.success(message),
            (Ok(()), false) => self.notifier.info(message),
        }
        self.notifier.state_changed();
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PayloadDescriptor;
    use crate::dispatch::{DispatchError, DispatchPhase, PayloadSource, Transport};
    use crate::event::{CoreEvent, NoticeLevel};
    use crate::store::MemoryBackend;
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    struct NamedSource;

    #[async_trait]
    impl PayloadSource for NamedSource {
        async fn fetch(&self, name: &str) -> Result<Vec<u8>, DispatchError> {
            if name.starts_with("missing") {
                return Err(DispatchError::SourceUnavailable {
                    location: self.locate(name),
                    reason: "no such file".to_string(),
                });
            }
            Ok(name.as_bytes().to_vec())
        }

        fn locate(&self, name: &str) -> String {
            format!("payloads/{}", name)
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl Transport for AcceptAll {
        async fn send(&self, _body: Vec<u8>) -> Result<(), DispatchError> {
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "mem://accept"
        }
    }

    async fn controller() -> (Controller, Arc<MemoryBackend>, broadcast::Receiver<CoreEvent>) {
        let catalog = Arc::new(
            Catalog::new(vec![
                PayloadDescriptor::new("a.bin", "first", 1.0),
                PayloadDescriptor::new("b.bin", "second", 2.0),
                PayloadDescriptor::new("missing.bin", "gone", 3.0),
            ])
            .unwrap(),
        );
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(StateStore::open(backend.clone()).await);
        let notifier = Notifier::default();
        let rx = notifier.subscribe();
        let engine = Arc::new(DispatchEngine::new(
            Arc::new(NamedSource),
            Arc::new(AcceptAll),
            store.clone(),
            notifier.clone(),
        ));
        (Controller::new(catalog, engine, store, notifier), backend, rx)
    }

    fn last_notice(rx: &mut broadcast::Receiver<CoreEvent>) -> Option<(String, NoticeLevel)> {
        let mut last = None;
        while let Ok(evt) = rx.try_recv() {
            if let CoreEvent::Notice(n) = evt {
                last = Some((n.message, n.level));
            }
        }
        last
    }

    #[tokio::test]
    async fn scenario_sequential_sends() {
        let (ctl, _backend, _rx) = controller().await;
        ctl.select_and_send("a.bin").await.await.unwrap();
        assert_eq!(ctl.snapshot().await.state.recents, vec!["a.bin"]);
        ctl.select_and_send("b.bin").await.await.unwrap();
        assert_eq!(ctl.snapshot().await.state.recents, vec!["b.bin", "a.bin"]);
        ctl.select_and_send("a.bin").await.await.unwrap();
        assert_eq!(ctl.snapshot().await.state.recents, vec!["a.bin", "b.bin"]);
    }

    #[tokio::test]
    async fn scenario_favorite_added_then_removed() {
        let (ctl, _backend, mut rx) = controller().await;

        let first = ctl.toggle_favorite("x.bin").await;
        assert_eq!(first.value.favorites, vec!["x.bin"]);
        let (msg, level) = last_notice(&mut rx).unwrap();
        assert_eq!(msg, "x.bin added to favorites");
        assert_eq!(level, NoticeLevel::Success);

        let second = ctl.toggle_favorite("x.bin").await;
        assert!(second.value.favorites.is_empty());
        let (msg, _) = last_notice(&mut rx).unwrap();
        assert_eq!(msg, "x.bin removed from favorites");
    }

    #[tokio::test]
    async fn failed_send_keeps_visual_selection() {
        let (ctl, _backend, mut rx) = controller().await;
        let outcome = ctl.select_and_send("missing.bin").await.await.unwrap();
        assert!(!outcome.is_sent());

        let snap = ctl.snapshot().await;
        assert_eq!(snap.selected.as_deref(), Some("missing.bin"));
        assert_eq!(snap.dispatch.selected_name, None);
        assert_eq!(snap.dispatch.phase, DispatchPhase::Failed);
        assert!(snap.state.recents.is_empty());

        let (msg, level) = last_notice(&mut rx).unwrap();
        assert_eq!(msg, crate::event::GENERIC_FAILURE);
        assert_eq!(level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn new_intent_takes_over_tracking_immediately() {
        let (ctl, _backend, _rx) = controller().await;
        let first = ctl.select_and_send("a.bin").await;
        let second = ctl.select_and_send("b.bin").await;

        // Tracking belongs to b from the moment its intent was issued.
        let snap = ctl.snapshot().await;
        assert_eq!(snap.selected.as_deref(), Some("b.bin"));
        assert_eq!(snap.dispatch.active.as_deref(), Some("b.bin"));

        first.await.unwrap();
        second.await.unwrap();
        let snap = ctl.snapshot().await;
        assert_eq!(snap.dispatch.active.as_deref(), Some("b.bin"));
        assert_eq!(snap.dispatch.phase, DispatchPhase::Sent);
        assert_eq!(snap.state.recents.len(), 2);
    }

    #[tokio::test]
    async fn rejected_favorite_write_is_flagged() {
        let (ctl, backend, mut rx) = controller().await;
        backend.set_reject_writes(true);
        let written = ctl.toggle_favorite("a.bin").await;
        assert!(!written.is_persisted());
        assert!(written.value.is_favorite);
        let (msg, level) = last_notice(&mut rx).unwrap();
        assert_eq!(msg, "a.bin added to favorites (not saved)");
        assert_eq!(level, NoticeLevel::Warning);
    }
}
