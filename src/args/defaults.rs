/// Address the server listens on unless told otherwise.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Sessions served concurrently before new connections wait for a slot.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Config files picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["ndt7-server.toml", "ndt7-server.json"];
