// Configuration-driven route tables and the compiled table cache
#[cfg(test)]
mod test {
    use std::{io::Write, path::Path};

    use restroute::{
        adapters::file_cache::CACHE_FILE_NAME,
        config::{
            DispatchConfig, DispatchConfigValidator, build_route_table, loader::load_config,
            placeholder_filters,
        },
    };
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(cache_dir: &Path, debug: bool) -> NamedTempFile {
        let content = format!(
            r#"
base_path = "/api"
version = "v1"
debug = {debug}
filters = ["auth"]

[cache]
dir = "{dir}"
ttl = "5m"

[[controllers]]
name = "users"
prefix = "users"

[controllers.policy]
filters = ["auth"]
content_types = ["application/json", "application/xml"]

[[controllers.actions]]
name = "show"
method = "GET"
uri = "<id>"
parameters = {{ id = '\d+' }}

[[controllers.actions]]
name = "by_name"
method = "GET"
uri = "<name>"

[[controllers.actions]]
name = "remove"
method = "DELETE"
uri = "<id>"
policy = {{ https_only = true, ip_allow = ["10.0.0.0/8"] }}
"#,
            dir = cache_dir.display().to_string().replace('\\', "/"),
        );

        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    async fn load(file: &NamedTempFile) -> DispatchConfig {
        let config = load_config(file.path().to_str().unwrap()).await.unwrap();
        DispatchConfigValidator::validate(&config).unwrap();
        config
    }

    #[tokio::test]
    async fn test_config_builds_expected_routes() {
        let cache_dir = TempDir::new().unwrap();
        let file = write_config(cache_dir.path(), true);
        let config = load(&file).await;

        let table = build_route_table(&config, placeholder_filters(&config.filters)).unwrap();
        let path = config.path_options().route_path("/api/v1/users/42");

        let m = table.match_route("GET", path).unwrap();
        assert_eq!(m.action, "show");
        assert_eq!(m.filters(), ["auth".to_string()]);
        assert_eq!(
            m.allowed_content_types(),
            ["application/json".to_string(), "application/xml".to_string()]
        );

        assert_eq!(table.match_route("GET", "users/ada").unwrap().action, "by_name");

        let remove = table.match_route("DELETE", "users/42").unwrap();
        assert!(remove.https_only());
        assert_eq!(remove.ip_allow(), vec!["10.0.0.0/8"]);
        // Actions inherit the controller's filters and content types.
        assert_eq!(remove.filters(), ["auth".to_string()]);

        let conflicts = table.diagnose();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("users::show") && conflicts[0].contains("users::by_name"));

        // Debug mode never writes the cache.
        assert!(!cache_dir.path().join(CACHE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_cached_table_matches_like_compiled() {
        let cache_dir = TempDir::new().unwrap();
        let file = write_config(cache_dir.path(), false);
        let config = load(&file).await;

        let first = build_route_table(&config, placeholder_filters(&config.filters)).unwrap();
        let compiled = first.freeze();
        assert!(cache_dir.path().join(CACHE_FILE_NAME).exists());

        let second = build_route_table(&config, placeholder_filters(&config.filters)).unwrap();
        let loaded = second.freeze();
        assert_eq!(*compiled, *loaded);

        for (method, uri) in [
            ("GET", "users/7"),
            ("GET", "users/ada"),
            ("DELETE", "users/7"),
            ("DELETE", "users/ada"),
            ("POST", "users/7"),
        ] {
            assert_eq!(
                first.match_route(method, uri).map(|m| (m.action.to_string(), m.parameters)),
                second.match_route(method, uri).map(|m| (m.action.to_string(), m.parameters)),
                "{method} {uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_corrupt_cache_degrades_to_compile() {
        let cache_dir = TempDir::new().unwrap();
        let file = write_config(cache_dir.path(), false);
        let config = load(&file).await;

        let cache_file = cache_dir.path().join(CACHE_FILE_NAME);
        std::fs::write(&cache_file, "definitely not json").unwrap();

        let table = build_route_table(&config, placeholder_filters(&config.filters)).unwrap();
        table.freeze();
        assert_eq!(table.match_route("GET", "users/7").unwrap().action, "show");

        // Replaced by a fresh entry.
        let contents = std::fs::read_to_string(&cache_file).unwrap();
        assert!(contents.contains("\"fingerprint\""));
    }

    #[tokio::test]
    async fn test_invalid_config_reports_every_problem() {
        let content = r#"
filters = ["auth"]

[[controllers]]
name = "users"
prefix = "users"
policy = { filters = ["audit"], ip_allow = ["10.0.0.0/40"] }

[[controllers.actions]]
name = "show"
method = "FETCH"
uri = "<id>"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(file, "{content}").unwrap();

        let config = load_config(file.path().to_str().unwrap()).await.unwrap();
        let message = DispatchConfigValidator::validate(&config)
            .unwrap_err()
            .to_string();

        assert!(message.contains("Found 3 validation errors"), "{message}");
        assert!(message.contains("audit"));
        assert!(message.contains("10.0.0.0/40"));
        assert!(message.contains("FETCH"));
    }
}
