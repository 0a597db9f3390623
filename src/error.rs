//! # Error taxonomy
//!
//! Every failure produced by the SDK resolves to a [`CouncilError`]. Reads that
//! are shared between several awaiting callers carry the error behind an `Arc`
//! ([`SharedError`]) so each caller observes the same failure.

use crate::types::conversions::ConversionError;
use std::sync::Arc;

/// Error shared between every caller awaiting the same in-flight read.
pub type SharedError = Arc<CouncilError>;

pub type Result<T, E = CouncilError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    /// Node/provider unreachable or rejected the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// A mutation was attempted without a connected signer.
    #[error("no signer connected")]
    Auth,

    /// The chain rejected a submitted transaction.
    #[error("transaction reverted{}", .reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default())]
    Revert { reason: Option<String> },

    /// Encoding a call failed (unknown method, wrong argument types).
    #[error("abi error: {0}")]
    Abi(String),

    /// A call or log returned data that does not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The same cache key was read back as a different type than it was stored with.
    #[error("cached value for {0} has an unexpected type")]
    CacheTypeMismatch(String),

    /// A transaction invocation can only be sent once.
    #[error("invocation {0} was already sent")]
    InvocationSpent(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CouncilError {
    /// Stable short label, used as the `kind` label of failed transaction metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CouncilError::Transport(_) => "transport",
            CouncilError::Auth => "auth",
            CouncilError::Revert { .. } => "revert",
            CouncilError::Abi(_) => "abi",
            CouncilError::Decode(_) => "decode",
            CouncilError::Conversion(_) => "conversion",
            CouncilError::CacheTypeMismatch(_) => "cache_type_mismatch",
            CouncilError::InvocationSpent(_) => "invocation_spent",
            CouncilError::Config(_) => "config",
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CouncilError::Transport(_))
    }
}

impl From<ethers::providers::ProviderError> for CouncilError {
    fn from(e: ethers::providers::ProviderError) -> Self {
        CouncilError::Transport(e.to_string())
    }
}

impl From<ethers::abi::Error> for CouncilError {
    fn from(e: ethers::abi::Error) -> Self {
        CouncilError::Abi(e.to_string())
    }
}
