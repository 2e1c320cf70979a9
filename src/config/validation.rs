use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Largest delay or timeout accepted anywhere in the configuration (one day)
const MAX_SECONDS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use HTTP or HTTPS, got '{}'",
            url.scheme()
        )));
    }

    validate_year("start_year", config.start_year)?;
    if let Some(end_year) = config.end_year {
        validate_year("end_year", end_year)?;
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    validate_seconds("backoff_factor", config.backoff_factor)?;
    validate_seconds("download_retry_min", config.download_retry_min)?;
    validate_range("delay_range", config.delay_range)?;
    validate_range("download_delay_range", config.download_delay_range)?;

    validate_timeout("connect_timeout", config.connect_timeout)?;
    validate_timeout("request_timeout", config.request_timeout)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if let Some(cache_dir) = &config.cache_dir {
        if cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "cache_dir cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_year(name: &str, year: i32) -> Result<(), ConfigError> {
    if !(1900..=2099).contains(&year) {
        return Err(ConfigError::Validation(format!(
            "{} must be a four-digit year between 1900 and 2099, got {}",
            name, year
        )));
    }
    Ok(())
}

fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=MAX_SECONDS).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0 and {} seconds, got {}",
            name, MAX_SECONDS, value
        )));
    }
    Ok(())
}

fn validate_timeout(name: &str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value > MAX_SECONDS || value.is_nan() {
        return Err(ConfigError::Validation(format!(
            "{} must be positive and at most {} seconds, got {}",
            name, MAX_SECONDS, value
        )));
    }
    Ok(())
}

fn validate_range(name: &str, [lower, upper]: [f64; 2]) -> Result<(), ConfigError> {
    validate_seconds(name, lower)?;
    validate_seconds(name, upper)?;
    if upper < lower {
        return Err(ConfigError::Validation(format!(
            "{} upper bound {} is below lower bound {}",
            name, upper, lower
        )));
    }
    Ok(())
}
