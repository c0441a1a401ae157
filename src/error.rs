//! Error types shared by the ringmaster and the players.

use std::io;
use thiserror::Error;

/// Result type for ring operations.
pub type Result<T> = std::result::Result<T, RingError>;

/// Every failure is fatal for the process that observes it; nothing here is retried.
#[derive(Debug, Error)]
pub enum RingError {
    /// Listening, accepting, connecting or querying a local port failed.
    #[error("failed to {what}: {source}")]
    TransportSetup {
        what: String,
        #[source]
        source: io::Error,
    },

    /// The remote end closed, reset, or stopped in the middle of a record.
    #[error("{peer} has disconnected")]
    PeerDisconnected { peer: String },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The readiness wait itself could not run.
    #[error("multiplexed wait failed: {0}")]
    Multiplex(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RingError {
    pub fn setup(what: impl Into<String>, source: io::Error) -> Self {
        Self::TransportSetup {
            what: what.into(),
            source,
        }
    }

    pub fn disconnected(peer: impl ToString) -> Self {
        Self::PeerDisconnected {
            peer: peer.to_string(),
        }
    }
}
