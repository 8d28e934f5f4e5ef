use crate::config::types::{
    Config, FetchConfig, RefreshConfig, ScheduleConfig, SearchListingEntry, StorageConfig,
};
use crate::model::VendorId;
use crate::vendors::is_known_vendor;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_storage_config(&config.storage)?;
    validate_schedule_config(&config.schedule)?;
    validate_refresh_config(&config.refresh)?;
    validate_search_listings(&config.search_listings)?;
    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connect_timeout_secs must be >= 1, got {}",
            config.connect_timeout_secs
        )));
    }

    if config.max_attempts == Some(0) {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates schedule configuration
fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.refresh_interval_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "refresh_interval_minutes must be >= 1, got {}",
            config.refresh_interval_minutes
        )));
    }

    if config.crawl_interval_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "crawl_interval_minutes must be >= 1, got {}",
            config.crawl_interval_minutes
        )));
    }

    validate_vendor_ids(&config.crawl_vendors)
}

/// Validates refresh configuration
fn validate_refresh_config(config: &RefreshConfig) -> Result<(), ConfigError> {
    validate_vendor_ids(&config.skip_sold_out_demotion)
}

/// Validates search listing entries
fn validate_search_listings(listings: &[SearchListingEntry]) -> Result<(), ConfigError> {
    for entry in listings {
        validate_vendor_ids(&[entry.vendor_id])?;

        let url = Url::parse(&entry.search_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid search URL '{}': {}", entry.search_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Search URL '{}' must use HTTP or HTTPS scheme",
                entry.search_url
            )));
        }
    }

    Ok(())
}

fn validate_vendor_ids(ids: &[VendorId]) -> Result<(), ConfigError> {
    match ids.iter().find(|id| !is_known_vendor(**id)) {
        Some(id) => Err(ConfigError::UnknownVendor(*id)),
        None => Ok(()),
    }
}
