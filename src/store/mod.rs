//! Pasteboard store: single-slot clip storage behind an actor.
//!
//! [`Pasteboard`] is a cheap clonable handle. Every mutation goes
//! through one command queue drained by a single task, so writes are
//! linearized and the change count advances by exactly one per commit.
//! Reads of the change count bypass the queue.

pub mod delay;
pub mod events;
pub mod scope;
pub mod state;
pub mod version;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clip::{Clip, PasteboardError, Properties, ProviderError, ShareOption};

pub use delay::{DelayProvider, DelayToken, ProviderFuture};
pub use events::{EventHub, Handler, SubscriptionId, Topic, UpdateEvent};
pub use scope::{Caller, ClaimedIdentity, IdentityOracle};
pub use state::PasteboardState;
pub use version::VersionCounter;

use state::{ResolveJob, Waiter};

/// Default bound on a single delay provider invocation.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Store configuration.
#[derive(Debug, Clone)]
pub struct PasteboardConfig {
    /// Identity of the device this store runs on.
    pub device_id: String,
    /// Upper bound on a provider call. `None` waits indefinitely.
    pub provider_timeout: Option<Duration>,
}

impl Default for PasteboardConfig {
    fn default() -> Self {
        Self {
            device_id: "local".to_string(),
            provider_timeout: Some(DEFAULT_PROVIDER_TIMEOUT),
        }
    }
}

/// Current time as Unix epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

enum Command {
    Clear {
        reply: oneshot::Sender<u64>,
    },
    Set {
        caller: Caller,
        clip: Clip,
        reply: oneshot::Sender<Result<u64, PasteboardError>>,
    },
    SetDelayed {
        caller: Caller,
        properties: Properties,
        provider: Arc<dyn DelayProvider>,
        reply: oneshot::Sender<DelayToken>,
    },
    Has {
        caller: Caller,
        tag: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    Get {
        caller: Caller,
        reply: Waiter,
    },
    SetShareOption {
        caller: Caller,
        option: ShareOption,
        reply: oneshot::Sender<Result<bool, PasteboardError>>,
    },
}

struct Resolution {
    epoch: u64,
    result: Result<Clip, ProviderError>,
}

/// Handle to a running pasteboard store.
#[derive(Clone)]
pub struct Pasteboard {
    cmd_tx: mpsc::UnboundedSender<Command>,
    versions: Arc<VersionCounter>,
    events: Arc<EventHub>,
    device_id: Arc<str>,
}

impl Pasteboard {
    /// Start the store actor on the current tokio runtime.
    pub fn spawn(config: PasteboardConfig) -> Self {
        let versions = Arc::new(VersionCounter::new());
        let events = Arc::new(EventHub::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = StoreActor {
            state: PasteboardState::new(Arc::clone(&versions)),
            events: Arc::clone(&events),
            provider_timeout: config.provider_timeout,
        };
        tokio::spawn(actor.run(cmd_rx));
        info!(device_id = %config.device_id, "pasteboard store started");

        Self {
            cmd_tx,
            versions,
            events,
            device_id: config.device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn clear(&self, _caller: &Caller) -> Result<u64, PasteboardError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    /// Publish `clip`, replacing whatever was there. Returns the new change count.
    pub async fn set(&self, caller: &Caller, clip: Clip) -> Result<u64, PasteboardError> {
        self.request(|reply| Command::Set {
            caller: caller.clone(),
            clip,
            reply,
        })
        .await?
    }

    /// Publish a placeholder whose records are produced by `provider`
    /// on the first read.
    pub async fn set_delayed(
        &self,
        caller: &Caller,
        properties: Properties,
        provider: Arc<dyn DelayProvider>,
    ) -> Result<DelayToken, PasteboardError> {
        self.request(|reply| Command::SetDelayed {
            caller: caller.clone(),
            properties,
            provider,
            reply,
        })
        .await
    }

    /// Whether `caller` can see a non-empty clip. Never runs a provider.
    pub async fn has(&self, caller: &Caller) -> bool {
        self.request(|reply| Command::Has {
            caller: caller.clone(),
            tag: None,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Whether the clip visible to `caller` carries an entry tagged `tag`.
    pub async fn has_data_type(&self, caller: &Caller, tag: &str) -> bool {
        self.request(|reply| Command::Has {
            caller: caller.clone(),
            tag: Some(tag.to_string()),
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Read the current clip as seen by `caller`.
    ///
    /// Suspends while a delay provider runs. Dropping the returned future
    /// abandons this read only; the provider keeps running.
    pub async fn get(&self, caller: &Caller) -> Result<Clip, PasteboardError> {
        self.request(|reply| Command::Get {
            caller: caller.clone(),
            reply,
        })
        .await?
    }

    /// Change the scope of the current clip. Returns `false` if the
    /// pasteboard is empty.
    pub async fn set_share_option(
        &self,
        caller: &Caller,
        option: ShareOption,
    ) -> Result<bool, PasteboardError> {
        self.request(|reply| Command::SetShareOption {
            caller: caller.clone(),
            option,
            reply,
        })
        .await?
    }

    /// Number of committed writes so far.
    pub fn change_count(&self) -> u64 {
        self.versions.current()
    }

    pub fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        self.events.subscribe(topic, handler)
    }

    /// Remove one handler, or all handlers for `topic` when `id` is `None`.
    pub fn unsubscribe(&self, topic: Topic, id: Option<SubscriptionId>) -> usize {
        self.events.unsubscribe(topic, id)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, PasteboardError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .map_err(|_| PasteboardError::Unavailable)?;
        rx.await.map_err(|_| PasteboardError::Unavailable)
    }
}

struct StoreActor {
    state: PasteboardState,
    events: Arc<EventHub>,
    provider_timeout: Option<Duration>,
}

impl StoreActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<Resolution>();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Some(job) = self.handle(cmd) {
                        self.start_provider(job, resolved_tx.clone());
                    }
                }
                Some(done) = resolved_rx.recv() => {
                    if let Some(version) = self.state.complete_resolution(done.epoch, done.result) {
                        debug!(version, "delayed clip resolved");
                        self.notify(version);
                    }
                }
            }
        }
        debug!("pasteboard store stopped");
    }

    fn handle(&mut self, cmd: Command) -> Option<ResolveJob> {
        match cmd {
            Command::Clear { reply } => {
                let version = self.state.clear();
                debug!(version, "clear");
                self.notify(version);
                let _ = reply.send(version);
            }
            Command::Set {
                caller,
                clip,
                reply,
            } => {
                let records = clip.record_count();
                let result = self.state.set(caller.clone(), clip);
                match &result {
                    Ok(version) => {
                        debug!(version, records, app_id = %caller.app_id, "set");
                    }
                    Err(e) => debug!(error = %e, app_id = %caller.app_id, "set rejected"),
                }
                if let Ok(version) = result {
                    self.notify(version);
                }
                let _ = reply.send(result);
            }
            Command::SetDelayed {
                caller,
                properties,
                provider,
                reply,
            } => {
                let token = self.state.set_delayed(caller.clone(), properties, provider);
                debug!(version = token.version, app_id = %caller.app_id, "set_delayed");
                self.notify(token.version);
                let _ = reply.send(token);
            }
            Command::Has { caller, tag, reply } => {
                let has = match tag {
                    Some(tag) => self.state.has_type(&caller, &tag),
                    None => self.state.has(&caller),
                };
                let _ = reply.send(has);
            }
            Command::Get { caller, reply } => return self.state.read(&caller, reply),
            Command::SetShareOption {
                caller,
                option,
                reply,
            } => {
                let _ = reply.send(self.state.set_share_option(&caller, option));
            }
        }
        None
    }

    fn start_provider(&self, job: ResolveJob, resolved_tx: mpsc::UnboundedSender<Resolution>) {
        let timeout = self.provider_timeout;
        debug!(epoch = job.epoch, "invoking delay provider");
        tokio::spawn(async move {
            let result = delay::invoke(job.provider, timeout).await;
            let _ = resolved_tx.send(Resolution {
                epoch: job.epoch,
                result,
            });
        });
    }

    fn notify(&self, change_count: u64) {
        self.events
            .publish(Topic::Update, &UpdateEvent { change_count });
    }
}
