//! Delayed rendering: providers that produce clip content on first read.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::clip::{validate, Clip, ProviderError};

pub type ProviderFuture = BoxFuture<'static, Result<Clip, ProviderError>>;

/// Source of a delayed clip's content.
///
/// Invoked at most once per successful resolution. A failed invocation
/// leaves the slot unresolved and the next read calls it again.
pub trait DelayProvider: Send + Sync {
    fn provide(&self) -> ProviderFuture;
}

impl<F, Fut> DelayProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Clip, ProviderError>> + Send + 'static,
{
    fn provide(&self) -> ProviderFuture {
        Box::pin(self())
    }
}

/// Binds a published placeholder to the epoch it was published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayToken {
    pub epoch: u64,
    pub version: u64,
}

/// Run `provider` once, bounded by `timeout`, and validate what it returns.
///
/// A panic inside the provider, whether in `provide` itself or while its
/// future is polled, comes back as [`ProviderError::Failed`].
pub(crate) async fn invoke(
    provider: Arc<dyn DelayProvider>,
    timeout: Option<Duration>,
) -> Result<Clip, ProviderError> {
    match AssertUnwindSafe(run(provider, timeout)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            warn!(%reason, "delay provider panicked");
            Err(ProviderError::Failed(format!("provider panicked: {reason}")))
        }
    }
}

async fn run(
    provider: Arc<dyn DelayProvider>,
    timeout: Option<Duration>,
) -> Result<Clip, ProviderError> {
    let fut = provider.provide();
    let clip = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "delay provider timed out");
                Err(ProviderError::TimedOut)
            }
        },
        None => fut.await,
    }?;
    validate::check_clip(&clip).map_err(|e| ProviderError::Invalid(e.to_string()))?;
    debug!(records = clip.record_count(), "delay provider resolved");
    Ok(clip)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
