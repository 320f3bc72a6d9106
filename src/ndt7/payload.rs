use bytes::Bytes;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio_tungstenite::tungstenite::Message;

use crate::error::SessionError;

use super::BUFFER_SIZE;

/// Random binary message generated once per session and sent repeatedly.
///
/// The payload lives in a reference-counted buffer, so every [`frame`]
/// shares the same bytes instead of copying or re-randomizing them.
///
/// [`frame`]: PreparedPayload::frame
#[derive(Debug, Clone)]
pub struct PreparedPayload {
    data: Bytes,
}

impl PreparedPayload {
    /// Fills a [`BUFFER_SIZE`] payload from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns an error when the random source fails.
    pub fn generate() -> Result<Self, SessionError> {
        Self::generate_with(&mut OsRng)
    }

    /// Fills a [`BUFFER_SIZE`] payload from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error when `rng` fails.
    pub fn generate_with<R>(rng: &mut R) -> Result<Self, SessionError>
    where
        R: RngCore,
    {
        let mut data = vec![0u8; BUFFER_SIZE];
        rng.try_fill_bytes(&mut data)
            .map_err(|err| SessionError::PreparePayload { source: err })?;
        Ok(Self {
            data: Bytes::from(data),
        })
    }

    #[must_use]
    pub fn frame(&self) -> Message {
        Message::Binary(self.data.clone())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
