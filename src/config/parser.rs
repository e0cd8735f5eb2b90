use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeIdentity;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[store]
database-path = "./test.db"
edge-identity = "pair-plus-display"

[frontier]
claim-lease-secs = 60

[driver]
workers = 4
fetch-timeout-secs = 10
retry-bugged = true

[keys]
excluded-prefixes = ["category:"]

[[seed]]
key = "France"
id = 1095
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.store.database_path, "./test.db");
        assert_eq!(config.store.edge_identity, EdgeIdentity::PairPlusDisplay);
        assert_eq!(config.frontier.claim_lease_secs, 60);
        assert_eq!(config.driver.workers, 4);
        assert!(config.driver.retry_bugged);
        assert_eq!(config.keys.excluded_prefixes, vec!["category:".to_string()]);
        assert_eq!(config.seed.len(), 1);
        assert_eq!(config.seed[0].id, Some(1095));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.store.edge_identity, EdgeIdentity::PairOnly);
        assert_eq!(config.driver.workers, 10);
        assert!(config
            .keys
            .excluded_prefixes
            .contains(&"catégorie:".to_string()));
        assert!(config.seed.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/wikicrawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_edge_identity_is_rejected() {
        let result = parse_config("[store]\nedge-identity = \"by-colour\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let result = parse_config("[driver]\nworkers = 0\n");
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
