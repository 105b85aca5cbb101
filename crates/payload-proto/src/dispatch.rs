//! Dispatch engine. Moves one payload's bytes to the receiver.
//!
//! A dispatch is split in two halves. `begin` runs synchronously with the
//! user's intent: it clears the selected name, starts a new tracked
//! invocation and announces it. `run` does the I/O and can be spawned as an
//! independent task. Several runs may be outstanding at once; only the most
//! recently begun one moves `DispatchStatus`, but every successful run records
//! its payload as recent, so the recents list follows completion order.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::is_bare_name;
use crate::event::{Notifier, GENERIC_FAILURE};
use crate::store::StateStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("payload source unavailable at {location}: {reason}")]
    SourceUnavailable { location: String, reason: String },
    #[error("transfer to {endpoint} failed: {reason}")]
    TransferFailed { endpoint: String, reason: String },
}

// ── Payload sources ───────────────────────────────────────────────────────────

/// Where payload bytes come from. The identifier is `base + name`.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, DispatchError>;

    /// Human-readable location of `name`, for logs and errors.
    fn locate(&self, name: &str) -> String;
}

/// Payloads stored as files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    base: PathBuf,
}

impl LocalDirSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl PayloadSource for LocalDirSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, DispatchError> {
        let path = self.base.join(name);
        if !is_bare_name(name) {
            return Err(DispatchError::SourceUnavailable {
                location: path.display().to_string(),
                reason: "not a file name inside the payload directory".to_string(),
            });
        }
        tokio::fs::read(&path)
            .await
            .map_err(|e| DispatchError::SourceUnavailable {
                location: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn locate(&self, name: &str) -> String {
        self.base.join(name).display().to_string()
    }
}

/// Payloads served over HTTP from a base URL.
#[derive(Debug, Clone)]
pub struct HttpDirSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PayloadSource for HttpDirSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, DispatchError> {
        let url = self.locate(name);
        let unavailable = |reason: String| DispatchError::SourceUnavailable {
            location: url.clone(),
            reason,
        };
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| unavailable(e.to_string()))?;
        let bytes = resp.bytes().await.map_err(|e| unavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn locate(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }
}

/// Pick a source for a configured location: `http(s)://` prefixes are served
/// over HTTP, anything else is a local directory.
pub fn source_for_location(location: &str, client: reqwest::Client) -> Arc<dyn PayloadSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpDirSource::new(client, location))
    } else {
        Arc::new(LocalDirSource::new(location))
    }
}

// ── Receiver transport ────────────────────────────────────────────────────────

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `body` to the receiver in a single request.
    async fn send(&self, body: Vec<u8>) -> Result<(), DispatchError>;

    fn endpoint(&self) -> &str;
}

/// POSTs the raw payload to a fixed URL. Any error status, connection
/// failure or timeout collapses to `TransferFailed`.
#[derive(Debug, Clone)]
pub struct HttpReceiver {
    client: reqwest::Client,
    url: String,
}

impl HttpReceiver {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpReceiver {
    async fn send(&self, body: Vec<u8>) -> Result<(), DispatchError> {
        let failed = |reason: String| DispatchError::TransferFailed {
            endpoint: self.url.clone(),
            reason,
        };
        self.client
            .post(&self.url)
            .body(body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPhase {
    #[default]
    Idle,
    Sending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStatus {
    /// Payload that last completed for the tracked invocation.
    pub selected_name: Option<String>,
    /// Payload of the tracked invocation, whatever its phase.
    pub active: Option<String>,
    pub phase: DispatchPhase,
}

/// Handle for one begun dispatch, consumed by `DispatchEngine::run`.
#[derive(Debug)]
pub struct DispatchTicket {
    name: String,
    generation: u64,
}

impl DispatchTicket {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        name: String,
        recents: Vec<String>,
        /// False when the recents list could not be written durably.
        persisted: bool,
    },
    Failed {
        name: String,
        error: DispatchError,
    },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sent { name, .. } | Self::Failed { name, .. } => name,
        }
    }
}

#[derive(Default)]
struct Tracking {
    generation: u64,
    status: DispatchStatus,
}

pub struct DispatchEngine {
    source: Arc<dyn PayloadSource>,
    transport: Arc<dyn Transport>,
    store: Arc<StateStore>,
    notifier: Notifier,
    tracking: RwLock<Tracking>,
}

impl DispatchEngine {
    pub fn new(
        source: Arc<dyn PayloadSource>,
        transport: Arc<dyn Transport>,
        store: Arc<StateStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            transport,
            store,
            notifier,
            tracking: RwLock::new(Tracking::default()),
        }
    }

    pub async fn status(&self) -> DispatchStatus {
        self.tracking.read().await.status.clone()
    }

    /// Begin and run a dispatch on the current task.
    pub async fn dispatch(&self, name: &str) -> DispatchOutcome {
        let ticket = self.begin(name).await;
        self.run(ticket).await
    }

    /// Start tracking a new invocation for `name`. Abandons tracking of any
    /// earlier invocation; its I/O keeps running.
    pub async fn begin(&self, name: &str) -> DispatchTicket {
        let generation = {
            let mut tracking = self.tracking.write().await;
            tracking.generation += 1;
            tracking.status = DispatchStatus {
                selected_name: None,
                active: Some(name.to_string()),
                phase: DispatchPhase::Sending,
            };
            tracking.generation
        };
        info!("dispatch #{} begin: {}", generation, name);
        self.notifier.info(format!("Injecting {}...", name));
        self.notifier.state_changed();
        DispatchTicket {
            name: name.to_string(),
            generation,
        }
    }

    /// Fetch and transmit the ticket's payload, then settle state.
    pub async fn run(&self, ticket: DispatchTicket) -> DispatchOutcome {
        let DispatchTicket { name, generation } = ticket;

        match self.transfer(&name).await {
            Ok(len) => {
                info!("dispatch #{} sent {} ({} bytes)", generation, name, len);
                self.settle(generation, &name, DispatchPhase::Sent).await;
                let written = self.store.record_recent(&name).await;
                let persisted = written.is_persisted();
                if persisted {
                    self.notifier.success(format!("{} sent successfully!", name));
                } else {
                    self.notifier
                        .warning(format!("{} sent successfully! (not saved)", name));
                }
                self.notifier.state_changed();
                DispatchOutcome::Sent {
                    name,
                    recents: written.value,
                    persisted,
                }
            }
            Err(error) => {
                warn!("dispatch #{} failed: {}", generation, error);
                self.settle(generation, &name, DispatchPhase::Failed).await;
                self.notifier.error(GENERIC_FAILURE);
                self.notifier.state_changed();
                DispatchOutcome::Failed { name, error }
            }
        }
    }

    async fn transfer(&self, name: &str) -> Result<usize, DispatchError> {
        debug!("fetching {}", self.source.locate(name));
        let bytes = self.source.fetch(name).await?;
        let len = bytes.len();
        debug!("posting {} bytes to {}", len, self.transport.endpoint());
        self.transport.send(bytes).await?;
        Ok(len)
    }

    /// Apply a terminal phase if `generation` is still the tracked one.
    async fn settle(&self, generation: u64, name: &str, phase: DispatchPhase) {
        let mut tracking = self.tracking.write().await;
        if tracking.generation != generation {
            debug!(
                "dispatch #{} ({}) settled after #{} began; status untouched",
                generation, name, tracking.generation
            );
            return;
        }
        tracking.status.phase = phase;
        tracking.status.selected_name = match phase {
            DispatchPhase::Sent => Some(name.to_string()),
            _ => None,
        };
    }
}
