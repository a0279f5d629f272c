use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate_first;

/// Directory holding a project's config file.
pub const PROJECT_DIR_NAME: &str = ".migdb";

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# migdb configuration
# Uncomment and edit settings below to override defaults.

# [debugger]
# program = "gdb"
# args = ["-nx"]
# use_tty = true

# [session]
# command_timeout_ms = 5000
# first_token = 1000001
# auto_update_vars = true

# [watch]
# max_container_elements = 1000

# [log]
# level = "info"
# file = "/tmp/migdb.log"
"#;

/// Default global config directory: `<platform config dir>/migdb`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("migdb"))
}

/// Load and merge configuration.
///
/// The layers are `Config::default()`, then `config_dir/config.toml`
/// (created with commented-out defaults when missing), then the first
/// `.migdb/config.toml` found from `project_dir` upward. The result is
/// validated once all layers are applied.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let mut layers = vec![ensure_global_config(config_dir)?];
    if let Some(project) = project_dir.and_then(find_project_config) {
        layers.push(project);
    }
    let config = apply_layers(&layers)?;
    validate_first(&config)?;
    Ok(config)
}

/// Load a single explicit file over the defaults.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let config = apply_layers(&[path.to_path_buf()])?;
    validate_first(&config)?;
    Ok(config)
}

/// Path of the global config file, written with defaults if absent.
fn ensure_global_config(config_dir: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::create_dir_all(config_dir)?;
    let path = config_dir.join("config.toml");
    if !path.exists() {
        std::fs::write(&path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("Created default config at {}", path.display());
    }
    Ok(path)
}

/// Fold `layers` over the defaults, lowest precedence first. Parse
/// errors name the file they came from.
fn apply_layers(layers: &[PathBuf]) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    for path in layers {
        let content = std::fs::read_to_string(path)?;
        if !has_non_comment_content(&content) {
            continue;
        }
        tracing::debug!("applying config layer {}", path.display());
        config = merge_configs(&config, &content).map_err(|e| match e {
            ConfigError::Parse(msg) => ConfigError::Parse(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
    }
    Ok(config)
}

/// Walk from `start` upward looking for `.migdb/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR_NAME).join("config.toml"))
        .find(|candidate| candidate.exists())
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

/// Parse a TOML string over the defaults into a validated [`Config`].
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config = merge_configs(&Config::default(), toml_str)?;
    validate_first(&config)?;
    Ok(config)
}
