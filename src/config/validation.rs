use crate::config::types::{Config, DriverConfig, FrontierConfig, KeyConfig, SeedEntry, StoreConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;
    validate_frontier_config(&config.frontier)?;
    validate_driver_config(&config.driver)?;
    validate_key_config(&config.keys)?;
    validate_seeds(&config.seed)?;
    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 20, got {}",
            config.max_retries
        )));
    }

    if config.retry_backoff_ms > 10_000 {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_ms must be <= 10000ms, got {}ms",
            config.retry_backoff_ms
        )));
    }

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.claim_lease_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "claim_lease_secs must be >= 1, got {}",
            config.claim_lease_secs
        )));
    }

    Ok(())
}

fn validate_driver_config(config: &DriverConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_secs must be >= 1, got {}",
            config.fetch_timeout_secs
        )));
    }

    if config.idle_poll_ms < 1 {
        return Err(ConfigError::Validation(
            "idle_poll_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_key_config(config: &KeyConfig) -> Result<(), ConfigError> {
    for prefix in &config.excluded_prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "excluded prefixes cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        if seed.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "seed key cannot be empty".to_string(),
            ));
        }

        if let Some(id) = seed.id {
            if id < 1 {
                return Err(ConfigError::Validation(format!(
                    "seed id for '{}' must be positive, got {}",
                    seed.key, id
                )));
            }
        }
    }

    Ok(())
}
