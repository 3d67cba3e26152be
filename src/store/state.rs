//! Store state: the current clip, its owner and any pending provider.
//!
//! All methods are synchronous transitions owned by the store actor.
//! The only side effects are oneshot replies to waiting readers.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use super::delay::{DelayProvider, DelayToken};
use super::epoch_millis;
use super::scope::{self, Caller};
use super::version::VersionCounter;
use crate::clip::{validate, Clip, PasteboardError, Properties, ProviderError, ShareOption};

pub(crate) type Waiter = oneshot::Sender<Result<Clip, PasteboardError>>;

/// Provider invocation the actor must start on behalf of a read.
pub(crate) struct ResolveJob {
    pub epoch: u64,
    pub provider: Arc<dyn DelayProvider>,
}

struct PendingDelay {
    provider: Arc<dyn DelayProvider>,
    resolving: bool,
    waiters: Vec<Waiter>,
}

struct Published {
    clip: Clip,
    owner: Caller,
    delay: Option<PendingDelay>,
}

/// The single pasteboard slot.
///
/// `epoch` advances on every clear/set/set_delayed. A provider result is
/// only accepted for the epoch it was started in.
pub struct PasteboardState {
    current: Option<Published>,
    epoch: u64,
    versions: Arc<VersionCounter>,
}

impl PasteboardState {
    pub fn new(versions: Arc<VersionCounter>) -> Self {
        Self {
            current: None,
            epoch: 0,
            versions,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn clear(&mut self) -> u64 {
        self.supersede();
        self.current = None;
        self.commit()
    }

    /// Publish `clip`. On rejection nothing changes.
    pub fn set(&mut self, owner: Caller, mut clip: Clip) -> Result<u64, PasteboardError> {
        validate::check_clip(&clip)?;
        self.supersede();
        let version = self.commit();
        clip.stamp(version, epoch_millis());
        self.current = Some(Published {
            clip,
            owner,
            delay: None,
        });
        Ok(version)
    }

    /// Publish a placeholder whose content comes from `provider` on first read.
    pub fn set_delayed(
        &mut self,
        owner: Caller,
        properties: Properties,
        provider: Arc<dyn DelayProvider>,
    ) -> DelayToken {
        self.supersede();
        let version = self.commit();
        let mut placeholder = Clip::placeholder(properties, version);
        placeholder.stamp(version, epoch_millis());
        self.current = Some(Published {
            clip: placeholder,
            owner,
            delay: Some(PendingDelay {
                provider,
                resolving: false,
                waiters: Vec::new(),
            }),
        });
        DelayToken {
            epoch: self.epoch,
            version,
        }
    }

    pub fn has(&self, reader: &Caller) -> bool {
        self.visible(reader)
            .is_some_and(|p| !p.clip.is_empty() || p.delay.is_some())
    }

    pub fn has_type(&self, reader: &Caller, tag: &str) -> bool {
        self.visible(reader).is_some_and(|p| p.clip.has_type(tag))
    }

    /// Answer `waiter` now, or park it on the pending provider.
    ///
    /// Returns a job when this read is the one that must start the provider.
    pub(crate) fn read(&mut self, reader: &Caller, waiter: Waiter) -> Option<ResolveJob> {
        let Some(published) = self
            .current
            .as_mut()
            .filter(|p| scope::permits(&p.owner, p.clip.properties(), reader))
        else {
            let _ = waiter.send(Ok(Clip::new()));
            return None;
        };

        let Some(delay) = published.delay.as_mut() else {
            let _ = waiter.send(Ok(published.clip.clone()));
            return None;
        };

        delay.waiters.push(waiter);
        if delay.resolving {
            return None;
        }
        delay.resolving = true;
        Some(ResolveJob {
            epoch: self.epoch,
            provider: Arc::clone(&delay.provider),
        })
    }

    /// Apply a provider result started in `epoch`.
    ///
    /// Returns the new version when the result was committed.
    pub(crate) fn complete_resolution(
        &mut self,
        epoch: u64,
        result: Result<Clip, ProviderError>,
    ) -> Option<u64> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "discarding stale provider result");
            return None;
        }
        let published = self.current.as_mut()?;
        let delay = published.delay.as_mut()?;

        match result {
            Ok(mut clip) => {
                let placeholder = published.clip.properties();
                clip.set_tag(placeholder.tag.clone());
                clip.set_local_only(placeholder.local_only);
                clip.set_share_option(placeholder.share_option);
                let version = self.versions.advance();
                clip.stamp(version, epoch_millis());

                for waiter in std::mem::take(&mut delay.waiters) {
                    let _ = waiter.send(Ok(clip.clone()));
                }
                published.delay = None;
                published.clip = clip;
                Some(version)
            }
            Err(err) => {
                delay.resolving = false;
                for waiter in delay.waiters.drain(..) {
                    let _ = waiter.send(Err(err.clone().into()));
                }
                None
            }
        }
    }

    /// Change the scope of the current clip. Only its owner may do so.
    ///
    /// Returns `false` when nothing is published.
    pub fn set_share_option(
        &mut self,
        caller: &Caller,
        option: ShareOption,
    ) -> Result<bool, PasteboardError> {
        let Some(published) = self.current.as_mut() else {
            return Ok(false);
        };
        if published.owner != *caller {
            return Err(PasteboardError::Parameter(
                "only the publishing application may change the share option".into(),
            ));
        }
        published.clip.set_share_option(option);
        Ok(true)
    }

    fn visible(&self, reader: &Caller) -> Option<&Published> {
        self.current
            .as_ref()
            .filter(|p| scope::permits(&p.owner, p.clip.properties(), reader))
    }

    fn commit(&mut self) -> u64 {
        self.epoch += 1;
        self.versions.advance()
    }

    /// Fail readers parked on a provider that is about to be replaced.
    fn supersede(&mut self) {
        let Some(delay) = self.current.as_mut().and_then(|p| p.delay.as_mut()) else {
            return;
        };
        for waiter in delay.waiters.drain(..) {
            let _ = waiter.send(Err(ProviderError::Superseded.into()));
        }
    }
}
