//! migdb configuration: TOML files merged global then project, plus
//! log-file helpers.

pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod merge;
pub mod validate;

pub use config::{Config, DebuggerConfig, LogConfig, LogLevel, SessionConfig, WatchConfig};
pub use error::ConfigError;
pub use load::{default_config_dir, load_config, load_file, load_from_str};
