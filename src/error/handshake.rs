use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use super::ValidationError;

#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The request was answered with a client error and no upgrade happened.
    #[error("Rejected download request: {source}")]
    Rejected {
        #[source]
        source: ValidationError,
    },
    #[error("Connection failed before the upgrade: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("Connection closed before the request was complete.")]
    Incomplete,
    #[error("No complete request within {timeout:?}.")]
    RequestTimeout {
        timeout: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },
    #[error("WebSocket upgrade failed: {source}")]
    Upgrade {
        #[source]
        source: Box<tungstenite::Error>,
    },
}
