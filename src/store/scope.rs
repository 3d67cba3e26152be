//! Scope guard: read-time visibility checks.
//!
//! Denial is silent: callers turn a `false` from [`permits`] into an
//! empty clip, never into an error, so an out-of-scope reader cannot
//! tell a hidden clip from an empty pasteboard.

use crate::clip::{Properties, ShareOption};

/// Resolved identity of a pasteboard caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    pub app_id: String,
    pub device_id: String,
}

impl Caller {
    pub fn new(app_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Maps handshake claims onto a [`Caller`].
///
/// Process and identity resolution belong to the host platform; the
/// broker only consumes the result through this trait.
pub trait IdentityOracle: Send + Sync {
    fn resolve(&self, app_id: &str, device_id: Option<&str>) -> Caller;
}

/// Oracle that trusts the handshake claims. A missing device id means
/// the local device.
#[derive(Debug, Clone)]
pub struct ClaimedIdentity {
    local_device: String,
}

impl ClaimedIdentity {
    pub fn new(local_device: impl Into<String>) -> Self {
        Self {
            local_device: local_device.into(),
        }
    }
}

impl IdentityOracle for ClaimedIdentity {
    fn resolve(&self, app_id: &str, device_id: Option<&str>) -> Caller {
        Caller::new(app_id, device_id.unwrap_or(&self.local_device))
    }
}

/// Whether `reader` may see a clip published by `owner` with `properties`.
///
/// - `InApp`: same application on the same device.
/// - `LocalDevice`: any caller on the owner's device.
/// - `CrossDevice`: any caller, unless the clip is flagged `local_only`.
pub fn permits(owner: &Caller, properties: &Properties, reader: &Caller) -> bool {
    let same_device = owner.device_id == reader.device_id;
    match properties.share_option {
        ShareOption::InApp => same_device && owner.app_id == reader.app_id,
        ShareOption::LocalDevice => same_device,
        ShareOption::CrossDevice => same_device || !properties.local_only,
    }
}
