//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;


pub use cli::ServerArgs;
pub use defaults::{DEFAULT_CONFIG_FILES, DEFAULT_LISTEN, DEFAULT_MAX_CONNECTIONS};
pub use types::PositiveUsize;
