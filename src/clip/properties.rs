//! Clip properties and share scope.

use serde::{Deserialize, Serialize};

/// Visibility boundary of a published clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOption {
    /// Only the writer's own application, on this device.
    InApp,
    /// Any process on this device.
    #[default]
    LocalDevice,
    /// Also remote devices in the same distributed session.
    CrossDevice,
}

impl ShareOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::LocalDevice => "local_device",
            Self::CrossDevice => "cross_device",
        }
    }
}

impl std::str::FromStr for ShareOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" | "in-app" => Ok(Self::InApp),
            "local_device" | "local-device" | "local" => Ok(Self::LocalDevice),
            "cross_device" | "cross-device" | "cross" => Ok(Self::CrossDevice),
            other => Err(format!(
                "unknown share option: {other} (expected: in_app, local_device, cross_device)"
            )),
        }
    }
}

/// Clip-level properties.
///
/// `tag` and `local_only` are set by the producer before publishing.
/// `timestamp` is assigned by the store at commit time. Only
/// `share_option` may change after publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub local_only: bool,
    #[serde(default)]
    pub share_option: ShareOption,
    /// Unix epoch millis of the commit that published this clip.
    #[serde(default)]
    pub timestamp: u64,
}
