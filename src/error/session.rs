use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Which write of a download session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Data,
    Measurement,
    Close,
}

impl SessionStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionStage::Data => "data message",
            SessionStage::Measurement => "measurement message",
            SessionStage::Close => "close message",
        }
    }
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to prepare random payload: {source}")]
    PreparePayload {
        #[source]
        source: rand::Error,
    },
    #[error("Timed out after {timeout:?} sending {stage}.")]
    WriteTimeout {
        stage: SessionStage,
        timeout: Duration,
    },
    #[error("Cannot send {stage}: {source}")]
    Transport {
        stage: SessionStage,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("Cannot serialize measurement: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}

impl SessionError {
    #[must_use]
    pub const fn stage(&self) -> Option<SessionStage> {
        match self {
            SessionError::WriteTimeout { stage, .. } | SessionError::Transport { stage, .. } => {
                Some(*stage)
            }
            SessionError::Serialize { .. } => Some(SessionStage::Measurement),
            SessionError::PreparePayload { .. } => None,
            #[cfg(test)]
            SessionError::TestExpectation { .. } | SessionError::TestExpectationValue { .. } => {
                None
            }
        }
    }
}
