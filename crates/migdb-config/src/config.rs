use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose; includes every MI line read and written.
    Trace,
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive for `tracing-subscriber`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How the debugger process is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    /// Debugger executable.
    #[serde(default = "default_program")]
    pub program: String,
    /// Extra arguments placed before `--interpreter=mi`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Give the debuggee its own pseudo-terminal.
    #[serde(default = "default_true")]
    pub use_tty: bool,
}

fn default_program() -> String {
    "gdb".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            use_tty: true,
        }
    }
}

/// Command correlation and update behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a command waits for its result record (must be > 0).
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// First token handed out.
    #[serde(default = "default_first_token")]
    pub first_token: u64,
    /// Refresh variable objects automatically after every stop.
    #[serde(default = "default_true")]
    pub auto_update_vars: bool,
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_first_token() -> u64 {
    1_000_001
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            first_token: default_first_token(),
            auto_update_vars: true,
        }
    }
}

/// Typed-watch limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Upper bound on decoded vector elements and map nodes (1 to 100000).
    #[serde(default = "default_max_container_elements")]
    pub max_container_elements: usize,
}

fn default_max_container_elements() -> usize {
    1000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_container_elements: default_max_container_elements(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file; the platform default when unset.
    pub file: Option<PathBuf>,
}

/// Top-level migdb configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debugger: DebuggerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub log: LogConfig,
}
