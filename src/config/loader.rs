use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::DispatchConfig;

/// Prefix of environment variables overriding file settings,
/// e.g. `RESTROUTE__DEBUG=true` or `RESTROUTE__CACHE__TTL=5m`.
pub const ENV_PREFIX: &str = "RESTROUTE";

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<DispatchConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<DispatchConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml, // Default to TOML
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let dispatch_config: DispatchConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    tracing::debug!(
        path = %config_path.display(),
        controllers = dispatch_config.controllers.len(),
        "Loaded dispatch configuration"
    );
    Ok(dispatch_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn test_load_toml_config() {
        let toml_content = r#"
base_path = "/api"
version = "v1"
filters = ["auth"]

[defaults]
content_types = ["application/json", "application/xml"]

[cache]
ttl = "10m"

[[controllers]]
name = "users"
prefix = "users"

[controllers.policy]
https_only = true

[[controllers.actions]]
name = "show"
method = "GET"
uri = "<id>"
parameters = { id = '\d+' }
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.base_path, "/api");
        assert_eq!(config.version.as_deref(), Some("v1"));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, "10m");
        assert_eq!(config.controllers.len(), 1);

        let users = &config.controllers[0];
        assert_eq!(users.policy.https_only, Some(true));
        assert_eq!(users.actions[0].parameters["id"], r"\d+");
        assert_eq!(
            config.defaults.content_types.as_deref(),
            Some(&["application/json".to_string(), "application/xml".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
debug: true
controllers:
  - name: "health"
    actions:
      - name: "ping"
        method: "GET"
        uri: "ping"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert!(config.debug);
        assert_eq!(config.controllers[0].prefix, "");
        assert_eq!(config.controllers[0].actions[0].uri, "ping");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config_sync("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to build config"));
    }
}
