//! Layering partial config files over a complete [`Config`].
//!
//! A config file is read as a [`ConfigOverlay`]: the same sections as
//! [`Config`] with every setting optional. Settings present in the file
//! replace the value below them (arrays replace, they do not append);
//! absent settings keep it. Unknown sections and keys are rejected so a
//! misspelt setting is reported instead of silently ignored.

use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{Config, LogLevel};
use crate::error::ConfigError;

/// One config file, every setting optional.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub debugger: DebuggerOverlay,
    #[serde(default)]
    pub session: SessionOverlay,
    #[serde(default)]
    pub watch: WatchOverlay,
    #[serde(default)]
    pub log: LogOverlay,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebuggerOverlay {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub use_tty: Option<bool>,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionOverlay {
    pub command_timeout_ms: Option<u64>,
    pub first_token: Option<u64>,
    pub auto_update_vars: Option<bool>,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchOverlay {
    pub max_container_elements: Option<usize>,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogOverlay {
    pub level: Option<LogLevel>,
    pub file: Option<PathBuf>,
}

impl ConfigOverlay {
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Write the present settings into `config`. Returns their dotted
    /// names, in section order.
    pub fn apply(self, config: &mut Config) -> Vec<&'static str> {
        let mut set = Vec::new();
        let debugger = &mut config.debugger;
        replace(&mut debugger.program, self.debugger.program, "debugger.program", &mut set);
        replace(&mut debugger.args, self.debugger.args, "debugger.args", &mut set);
        replace(&mut debugger.use_tty, self.debugger.use_tty, "debugger.use_tty", &mut set);

        let session = &mut config.session;
        replace(
            &mut session.command_timeout_ms,
            self.session.command_timeout_ms,
            "session.command_timeout_ms",
            &mut set,
        );
        replace(&mut session.first_token, self.session.first_token, "session.first_token", &mut set);
        replace(
            &mut session.auto_update_vars,
            self.session.auto_update_vars,
            "session.auto_update_vars",
            &mut set,
        );

        replace(
            &mut config.watch.max_container_elements,
            self.watch.max_container_elements,
            "watch.max_container_elements",
            &mut set,
        );

        replace(&mut config.log.level, self.log.level, "log.level", &mut set);
        replace(&mut config.log.file, self.log.file.map(Some), "log.file", &mut set);
        set
    }
}

fn replace<T>(slot: &mut T, value: Option<T>, key: &'static str, set: &mut Vec<&'static str>) {
    if let Some(value) = value {
        *slot = value;
        set.push(key);
    }
}

/// Apply the config file text `overlay_toml` on top of `base`.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let mut merged = base.clone();
    let set = ConfigOverlay::parse(overlay_toml)?.apply(&mut merged);
    if !set.is_empty() {
        tracing::debug!("config overrides: {}", set.join(", "));
    }
    Ok(merged)
}
