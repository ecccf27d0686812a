#![allow(clippy::collapsible_if)]

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    config::{builder, models::DispatchConfig},
    core::{RouteError, RouteTable},
};

static BASE_PATH_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._~/-]*$").expect("valid base path regex"));

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid {context}: {source}")]
    Registration {
        context: String,
        #[source]
        source: RouteError,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Dispatch configuration validator
pub struct DispatchConfigValidator;

impl DispatchConfigValidator {
    /// Validate the entire dispatch configuration
    ///
    /// Every route is registered against a scratch table, so registration
    /// problems are reported exactly as startup would hit them.
    pub fn validate(config: &DispatchConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_base_path(&config.base_path) {
            errors.push(e);
        }

        if let Some(version) = &config.version {
            if let Err(e) = Self::validate_version(version) {
                errors.push(e);
            }
        }

        if config.cache_active() {
            if let Err(e) = config.cache.ttl_duration() {
                errors.push(ValidationError::InvalidField {
                    field: "cache.ttl".to_string(),
                    message: format!("'{}' is not a duration: {e}", config.cache.ttl),
                });
            }
            if config.cache.dir.trim().is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: "cache.dir".to_string(),
                    message: "Cannot be empty when the cache is enabled".to_string(),
                });
            }
        }

        if let Err(mut filter_errors) = Self::validate_filter_names(&config.filters) {
            errors.append(&mut filter_errors);
        }

        if config.controllers.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "controllers".to_string(),
            });
        } else {
            let mut scratch = RouteTable::with_filters(builder::pass_through_filters(&config.filters));
            errors.extend(builder::register_routes(config, &mut scratch));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_base_path(base_path: &str) -> ValidationResult<()> {
        if !BASE_PATH_FORMAT.is_match(base_path) {
            return Err(ValidationError::InvalidField {
                field: "base_path".to_string(),
                message: format!("'{base_path}' may only contain URL path characters"),
            });
        }
        if base_path.contains("//") {
            return Err(ValidationError::InvalidField {
                field: "base_path".to_string(),
                message: "Cannot contain empty segments".to_string(),
            });
        }
        Ok(())
    }

    fn validate_version(version: &str) -> ValidationResult<()> {
        let trimmed = version.trim_matches('/');
        if trimmed.is_empty() || trimmed.contains('/') || !BASE_PATH_FORMAT.is_match(trimmed) {
            return Err(ValidationError::InvalidField {
                field: "version".to_string(),
                message: format!("'{version}' must be a single path segment, e.g. 'v1'"),
            });
        }
        Ok(())
    }

    fn validate_filter_names(names: &[String]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for name in names {
            if name.trim().is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: "filters".to_string(),
                    message: "Filter names cannot be empty".to_string(),
                });
            } else if !seen.insert(name.as_str()) {
                errors.push(ValidationError::Registration {
                    context: "filters".to_string(),
                    source: RouteError::DuplicateFilter { name: name.clone() },
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Format multiple validation errors into a single message
    pub(crate) fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::models::{ActionConfig, ControllerConfig, PolicyConfig};

    fn action(name: &str, method: &str, uri: &str) -> ActionConfig {
        ActionConfig {
            name: name.to_string(),
            method: method.to_string(),
            uri: uri.to_string(),
            parameters: BTreeMap::new(),
            policy: PolicyConfig::default(),
        }
    }

    fn minimal_valid_config() -> DispatchConfig {
        DispatchConfig {
            base_path: "/api".to_string(),
            version: Some("v1".to_string()),
            filters: vec!["auth".to_string()],
            controllers: vec![ControllerConfig {
                name: "users".to_string(),
                prefix: "users".to_string(),
                policy: PolicyConfig {
                    filters: Some(vec!["auth".to_string()]),
                    ..PolicyConfig::default()
                },
                actions: vec![action("list", "GET", ""), action("show", "GET", "<id>")],
            }],
            ..DispatchConfig::default()
        }
    }

    fn message(config: &DispatchConfig) -> String {
        match DispatchConfigValidator::validate(config) {
            Err(ValidationError::ValidationFailed { message }) => message,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(DispatchConfigValidator::validate(&minimal_valid_config()).is_ok());
    }

    #[test]
    fn validate_rejects_missing_controllers() {
        let config = DispatchConfig::default();
        assert!(message(&config).contains("controllers"));
    }

    #[test]
    fn validate_rejects_bad_cache_ttl_only_when_cache_active() {
        let mut config = minimal_valid_config();
        config.cache.ttl = "soon".to_string();
        assert!(message(&config).contains("cache.ttl"));

        config.debug = true;
        assert!(DispatchConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn validate_rejects_bad_paths() {
        let mut config = minimal_valid_config();
        config.base_path = "/api v2".to_string();
        config.version = Some("v1/beta".to_string());

        let message = message(&config);
        assert!(message.contains("Found 2 validation errors"));
        assert!(message.contains("base_path"));
        assert!(message.contains("version"));
    }

    #[test]
    fn validate_collects_registration_errors() {
        let mut config = minimal_valid_config();
        let users = &mut config.controllers[0];
        users.actions.push(action("show", "POST", ""));
        users.actions.push(action("trace", "TRACE", ""));
        users.actions[1]
            .parameters
            .insert("missing".to_string(), r"\d+".to_string());
        users.policy.ip_allow = Some(vec!["10.0.0.0/33".to_string()]);
        config.controllers.push(ControllerConfig {
            name: "broken".to_string(),
            prefix: "a//b".to_string(),
            policy: PolicyConfig::default(),
            actions: vec![],
        });

        let message = message(&config);
        assert!(message.contains("Found 5 validation errors"), "{message}");
        assert!(message.contains("users::show"));
        assert!(message.contains("TRACE"));
        assert!(message.contains("10.0.0.0/33"));
        assert!(message.contains("a//b"));
    }

    #[test]
    fn validate_rejects_unknown_and_duplicate_filters() {
        let mut config = minimal_valid_config();
        config.filters.push("auth".to_string());
        config.controllers[0].actions[0].policy.filters = Some(vec!["audit".to_string()]);

        let message = message(&config);
        assert!(message.contains("already registered"), "{message}");
        assert!(message.contains("audit"));
    }
}
