use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Address, Block};

/// Common result alias for chain and registry reads.
pub type SourceResult<T> = Result<T, ConnectivityError>;

/// Transient failure talking to the chain or the job registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("transport error calling `{method}`: {reason}")]
    Transport { method: String, reason: String },
    #[error("node rejected `{method}` with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("invalid response to `{method}`: {reason}")]
    InvalidResponse { method: String, reason: String },
}

impl ConnectivityError {
    pub fn transport(method: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            method: method.into(),
            reason: err.to_string(),
        }
    }

    pub fn invalid(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            reason: reason.into(),
        }
    }
}

/// Failure delivering a notification to an external channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery transport failed: {0}")]
    Transport(String),
    #[error("delivery rejected with HTTP status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Height of the current chain head.
    async fn current_height(&self) -> SourceResult<u64>;
    /// Block at `height` with its transactions; `None` when the node does not
    /// (yet) know the height.
    async fn block_at(&self, height: u64) -> SourceResult<Option<Block>>;
}

#[async_trait]
pub trait WhitelistSource: Send + Sync {
    async fn addresses(&self) -> SourceResult<Vec<Address>>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short identifier used in logs and aggregated failures.
    fn name(&self) -> &str;
    async fn notify(&self, job: &Address, tx_hash: &str) -> Result<(), DeliveryError>;
}
