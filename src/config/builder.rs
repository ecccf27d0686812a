//! Turning a [`DispatchConfig`] into a ready-to-freeze [`RouteTable`].

use std::sync::Arc;

use crate::{
    adapters::FileRouteCache,
    config::{
        models::{DispatchConfig, PolicyConfig},
        validation::{DispatchConfigValidator, ValidationError, ValidationResult},
    },
    core::{FilterRegistry, PolicyRecord, RouteError, RouteTable},
    ports::RouteCache,
};

fn registration(context: impl Into<String>, source: RouteError) -> ValidationError {
    ValidationError::Registration {
        context: context.into(),
        source,
    }
}

/// Build the route table described by `config`.
///
/// `filters` must already hold every filter the policies refer to. The
/// returned table is not frozen yet, so the caller can still add routes that
/// are registered in code.
pub fn build_route_table(
    config: &DispatchConfig,
    filters: Arc<FilterRegistry>,
) -> ValidationResult<RouteTable> {
    let mut table = RouteTable::with_filters(filters);
    if let Some(cache) = route_cache(config)? {
        table = table.with_cache(cache);
    }

    let mut errors = register_routes(config, &mut table);
    match errors.len() {
        0 => {
            tracing::debug!(
                controllers = table.controllers().len(),
                "Route table built from configuration"
            );
            Ok(table)
        }
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::ValidationFailed {
            message: DispatchConfigValidator::format_multiple_errors(errors),
        }),
    }
}

/// The cache the configuration asks for, if any.
pub fn route_cache(config: &DispatchConfig) -> ValidationResult<Option<Arc<dyn RouteCache>>> {
    if !config.cache_active() {
        return Ok(None);
    }

    let ttl = config
        .cache
        .ttl_duration()
        .map_err(|e| ValidationError::InvalidField {
            field: "cache.ttl".to_string(),
            message: e.to_string(),
        })?;
    Ok(Some(Arc::new(FileRouteCache::new(&config.cache.dir, ttl))))
}

/// Registry where every name passes all requests through.
///
/// Lets the configured routes be built and inspected without the host
/// application's real filters.
pub fn placeholder_filters(names: &[String]) -> Arc<FilterRegistry> {
    if !names.is_empty() {
        tracing::warn!(
            filters = ?names,
            "Using pass-through placeholders for application filters"
        );
    }
    pass_through_filters(names)
}

pub(crate) fn pass_through_filters(names: &[String]) -> Arc<FilterRegistry> {
    let registry = FilterRegistry::new();
    for name in names {
        if name.trim().is_empty() || registry.contains(name) {
            tracing::debug!(filter = %name, "Skipping blank or repeated filter name");
            continue;
        }
        if let Err(e) = registry.register_fn(name, |_, _| Ok(())) {
            tracing::warn!(filter = %name, error = %e, "Placeholder filter not registered");
        }
    }
    Arc::new(registry)
}

/// Register every configured controller and action, collecting all failures
/// instead of stopping at the first one.
pub(crate) fn register_routes(config: &DispatchConfig, table: &mut RouteTable) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let filters = Arc::clone(table.filters());

    match table.defaults_mut() {
        Ok(defaults) => apply_policy(defaults, &config.defaults, &filters, "defaults", &mut errors),
        Err(e) => {
            errors.push(registration("defaults", e));
            return errors;
        }
    }

    for controller_config in &config.controllers {
        let context = format!("controller '{}'", controller_config.name);
        let controller = match table.add_controller(&controller_config.prefix, &controller_config.name) {
            Ok(controller) => controller,
            Err(e) => {
                errors.push(registration(context, e));
                continue;
            }
        };

        // Before any action exists, so every action inherits it.
        apply_policy(
            controller.policy_mut(),
            &controller_config.policy,
            &filters,
            &context,
            &mut errors,
        );

        for action_config in &controller_config.actions {
            let context = format!("action '{}::{}'", controller_config.name, action_config.name);
            let action = match controller.add_action(&action_config.method, &action_config.uri, &action_config.name) {
                Ok(action) => action,
                Err(e) => {
                    errors.push(registration(context, e));
                    continue;
                }
            };

            for (name, regex) in &action_config.parameters {
                if let Err(e) = action.parameter(name, regex) {
                    errors.push(registration(context.as_str(), e));
                }
            }
            apply_policy(action.policy_mut(), &action_config.policy, &filters, &context, &mut errors);
        }
    }

    errors
}

fn apply_policy(
    record: &mut PolicyRecord,
    policy: &PolicyConfig,
    filters: &FilterRegistry,
    context: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut results = Vec::new();

    if let Some(content_types) = &policy.content_types {
        results.push(record.set_allowed_content_types(content_types).map(|_| ()));
    }
    if let Some(https_only) = policy.https_only {
        results.push(record.set_https_only(https_only).map(|_| ()));
    }
    if let Some(networks) = &policy.ip_allow {
        results.push(record.set_ip_allow(networks).map(|_| ()));
    }
    if let Some(networks) = &policy.ip_deny {
        results.push(record.set_ip_deny(networks).map(|_| ()));
    }
    if let Some(names) = &policy.filters {
        results.push(record.set_filters(names, filters).map(|_| ()));
    }

    errors.extend(
        results
            .into_iter()
            .filter_map(Result::err)
            .map(|e| registration(context, e)),
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::models::{ActionConfig, CacheConfig, ControllerConfig};

    fn config() -> DispatchConfig {
        DispatchConfig {
            debug: true,
            filters: vec!["auth".to_string()],
            defaults: PolicyConfig {
                content_types: Some(vec!["application/json".to_string(), "text/csv".to_string()]),
                ..PolicyConfig::default()
            },
            controllers: vec![ControllerConfig {
                name: "users".to_string(),
                prefix: "users".to_string(),
                policy: PolicyConfig {
                    https_only: Some(true),
                    filters: Some(vec!["auth".to_string()]),
                    ..PolicyConfig::default()
                },
                actions: vec![ActionConfig {
                    name: "show".to_string(),
                    method: "get".to_string(),
                    uri: "<id>".to_string(),
                    parameters: BTreeMap::from([("id".to_string(), r"\d+".to_string())]),
                    policy: PolicyConfig {
                        ip_deny: Some(vec!["192.168.*.*".to_string()]),
                        ..PolicyConfig::default()
                    },
                }],
            }],
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn test_build_applies_policies_in_order() {
        let config = config();
        let table = build_route_table(&config, pass_through_filters(&config.filters)).unwrap();

        let m = table.match_route("GET", "users/12").expect("match");
        assert_eq!(m.param("id"), Some("12"));
        assert!(m.https_only());
        assert_eq!(m.filters(), ["auth".to_string()]);
        assert_eq!(m.ip_deny(), vec!["192.168.*.*"]);
        assert_eq!(
            m.allowed_content_types(),
            ["application/json".to_string(), "text/csv".to_string()]
        );
        assert!(table.match_route("GET", "users/abc").is_none());
    }

    #[test]
    fn test_build_reports_registration_error() {
        let mut config = config();
        config.controllers[0].actions[0].policy.ip_allow = Some(vec!["10.0.0.1".to_string()]);

        let err = build_route_table(&config, pass_through_filters(&config.filters))
            .err()
            .expect("conflicting lists");
        assert_eq!(
            err,
            ValidationError::Registration {
                context: "action 'users::show'".to_string(),
                source: RouteError::ConflictingPolicy,
            }
        );
    }

    #[test]
    fn test_build_requires_registered_filters() {
        let config = config();
        let err = build_route_table(&config, Arc::new(FilterRegistry::new()))
            .err()
            .expect("unknown filter");
        assert!(err.to_string().contains("auth"));
    }

    #[test]
    fn test_build_lists_every_registration_error() {
        let mut config = config();
        config.controllers[0].actions[0].method = "FETCH".to_string();
        config.controllers.push(ControllerConfig {
            name: "users".to_string(),
            prefix: "people".to_string(),
            policy: PolicyConfig::default(),
            actions: Vec::new(),
        });

        let message = build_route_table(&config, pass_through_filters(&config.filters))
            .err()
            .expect("two errors")
            .to_string();
        assert!(message.contains("Found 2 validation errors"), "{message}");
        assert!(message.contains("FETCH"), "{message}");
        assert!(message.contains("Duplicate controller name 'users'"), "{message}");
    }

    #[test]
    fn test_pass_through_filters_skip_blank_and_repeated_names() {
        let names = ["auth", "", "  ", "auth", "audit"].map(String::from);
        let registry = pass_through_filters(&names);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("auth"));
        assert!(registry.contains("audit"));
    }

    #[test]
    fn test_route_cache_follows_debug_and_enabled() {
        let mut config = config();
        assert!(route_cache(&config).unwrap().is_none());

        config.debug = false;
        assert!(route_cache(&config).unwrap().is_some());

        config.cache = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        assert!(route_cache(&config).unwrap().is_none());

        config.cache = CacheConfig {
            ttl: "later".to_string(),
            ..CacheConfig::default()
        };
        assert!(route_cache(&config).is_err());
    }
}
