mod app;
mod config;
mod handshake;
mod session;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use handshake::HandshakeError;
pub use session::{SessionError, SessionStage};
pub use validation::ValidationError;
