use crate::config::Config;
use crate::error::ConfigError;

/// Largest accepted `watch.max_container_elements`.
pub const MAX_CONTAINER_ELEMENTS_LIMIT: usize = 100_000;

/// Validate a [`Config`], returning every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.debugger.program.trim().is_empty() {
        errors.push(ConfigError::Validation {
            field: "debugger.program".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.session.command_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "session.command_timeout_ms".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    let max = config.watch.max_container_elements;
    if max == 0 || max > MAX_CONTAINER_ELEMENTS_LIMIT {
        errors.push(ConfigError::Validation {
            field: "watch.max_container_elements".to_string(),
            message: format!("must be 1-{MAX_CONTAINER_ELEMENTS_LIMIT}, got {max}"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// First violation as a single error, for callers that stop at one.
pub(crate) fn validate_first(config: &Config) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.session.command_timeout_ms = 0;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(format!("{}", errs[0]).contains("session.command_timeout_ms"));
    }

    #[test]
    fn container_limit_bounds() {
        let mut cfg = Config::default();
        cfg.watch.max_container_elements = 0;
        assert!(validate(&cfg).is_err());
        cfg.watch.max_container_elements = MAX_CONTAINER_ELEMENTS_LIMIT + 1;
        let errs = validate(&cfg).unwrap_err();
        assert!(format!("{}", errs[0]).contains("watch.max_container_elements"));
        cfg.watch.max_container_elements = 1;
        assert!(validate(&cfg).is_ok());
        cfg.watch.max_container_elements = MAX_CONTAINER_ELEMENTS_LIMIT;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn blank_program_rejected() {
        let mut cfg = Config::default();
        cfg.debugger.program = "  ".into();
        let errs = validate(&cfg).unwrap_err();
        assert!(format!("{}", errs[0]).contains("debugger.program"));
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.debugger.program = String::new();
        cfg.session.command_timeout_ms = 0;
        cfg.watch.max_container_elements = 0;
        assert_eq!(validate(&cfg).unwrap_err().len(), 3);
    }

    #[test]
    fn validate_first_reports_first_violation() {
        let mut cfg = Config::default();
        cfg.session.command_timeout_ms = 0;
        cfg.watch.max_container_elements = 0;
        match validate_first(&cfg) {
            Err(ConfigError::Validation { field, .. }) => {
                assert_eq!(field, "session.command_timeout_ms")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
