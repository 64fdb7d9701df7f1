use crate::config::types::{Config, CrawlerConfig, SelectorProfile};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;

    if config.user_agent.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    validate_profiles(&config.profiles)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates selector profiles: unique names, parseable selectors and patterns
fn validate_profiles(profiles: &[SelectorProfile]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for profile in profiles {
        if profile.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "profile name cannot be empty".to_string(),
            ));
        }

        if !names.insert(profile.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate profile name '{}'",
                profile.name
            )));
        }

        for (kind, list) in [
            ("title", &profile.title),
            ("catalog", &profile.catalog),
            ("content", &profile.content),
        ] {
            if list.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "profile '{}' has an empty {} selector list",
                    profile.name, kind
                )));
            }

            for selector in list {
                Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
                    profile: profile.name.clone(),
                    selector: selector.clone(),
                })?;
            }
        }

        for pattern in &profile.boilerplate {
            Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        }
    }

    Ok(())
}
