//! Error taxonomy for clip construction and store access.
//!
//! Every variant carries a stable machine-readable code (see
//! [`PasteboardError::code`]) that the broker echoes on the wire.
//! Scope denials are deliberately absent: an out-of-scope reader sees
//! an empty clip, never an error.

/// Errors surfaced by clip mutation and pasteboard reads/writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasteboardError {
    /// Malformed input: oversize or empty tag, payload shape that the
    /// tag's declared kind forbids.
    #[error("parameter error: {0}")]
    Parameter(String),
    /// Record ceiling exceeded.
    #[error("capacity error: clip already holds {limit} records")]
    Capacity { limit: usize },
    /// Index argument outside `0..len`.
    #[error("index error: {index} out of range for {len} records")]
    Index { index: usize, len: usize },
    /// Delayed-rendering provider failed or did not answer in time.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The store actor is gone; no request can be served.
    #[error("pasteboard unavailable")]
    Unavailable,
}

impl PasteboardError {
    /// Wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parameter(_) => "parameter_error",
            Self::Capacity { .. } => "capacity_error",
            Self::Index { .. } => "index_error",
            Self::Provider(_) => "provider_error",
            Self::Unavailable => "unavailable",
        }
    }

    /// Reconstruct an error from a wire code and message.
    ///
    /// Used by clients to map a broker error response back onto the
    /// typed taxonomy. Unknown codes, and an `index_error` whose detail does
    /// not carry the range, collapse to [`PasteboardError::Parameter`].
    pub fn from_code(code: &str, detail: &str) -> Self {
        match code {
            "capacity_error" => Self::Capacity {
                limit: super::MAX_RECORDS,
            },
            "index_error" => parse_index_detail(detail)
                .map(|(index, len)| Self::Index { index, len })
                .unwrap_or_else(|| Self::Parameter(detail.to_string())),
            "provider_error" => Self::Provider(ProviderError::Failed(detail.to_string())),
            "unavailable" => Self::Unavailable,
            _ => Self::Parameter(detail.to_string()),
        }
    }
}

/// Recover `(index, len)` from the `Display` text of [`PasteboardError::Index`].
fn parse_index_detail(detail: &str) -> Option<(usize, usize)> {
    let rest = detail.strip_prefix("index error: ")?;
    let (index, rest) = rest.split_once(" out of range for ")?;
    let len = rest.strip_suffix(" records")?;
    Some((index.parse().ok()?, len.parse().ok()?))
}

/// Failure modes of a delayed-rendering provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider failed: {0}")]
    Failed(String),
    #[error("provider timed out")]
    TimedOut,
    #[error("provider disconnected")]
    Disconnected,
    #[error("provider produced an invalid clip: {0}")]
    Invalid(String),
    #[error("clip superseded before the provider answered")]
    Superseded,
}
