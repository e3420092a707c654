use crate::error::ThrottlerError;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Longest accepted replenishment window.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Validates configuration values for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the capacity and window of a permit pool
    pub fn validate_pool(capacity: usize, window: Duration) -> Result<(), ThrottlerError> {
        if capacity == 0 {
            return Err(ThrottlerError::Config(
                "Permit capacity must be greater than 0".to_string(),
            ));
        }

        if capacity > Semaphore::MAX_PERMITS {
            return Err(ThrottlerError::Config(format!(
                "Permit capacity must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }

        if window.is_zero() {
            return Err(ThrottlerError::Config(
                "Window duration must be greater than 0".to_string(),
            ));
        }

        if window > MAX_WINDOW {
            return Err(ThrottlerError::Config(format!(
                "Window duration must not exceed {}",
                humantime::format_duration(MAX_WINDOW)
            )));
        }

        Ok(())
    }

    /// Validates a submission endpoint URL
    pub fn validate_endpoint(url: &str) -> Result<(), ThrottlerError> {
        if url.is_empty() {
            return Err(ThrottlerError::Config(
                "Endpoint URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ThrottlerError::Config(
                "Endpoint URL must start with 'http://' or 'https://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates worker queue parameters
    pub fn validate_queue(workers: usize, depth: usize) -> Result<(), ThrottlerError> {
        if workers == 0 {
            return Err(ThrottlerError::Config(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if depth == 0 {
            return Err(ThrottlerError::Config(
                "Queue depth must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a per-request transport timeout
    pub fn validate_timeout(timeout: Duration) -> Result<(), ThrottlerError> {
        if timeout.is_zero() {
            return Err(ThrottlerError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pool() {
        assert!(ConfigValidator::validate_pool(5, Duration::from_secs(1)).is_ok());
        assert!(ConfigValidator::validate_pool(1, Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_invalid_pool() {
        assert!(ConfigValidator::validate_pool(0, Duration::from_secs(1)).is_err());
        assert!(ConfigValidator::validate_pool(5, Duration::ZERO).is_err());
        assert!(
            ConfigValidator::validate_pool(Semaphore::MAX_PERMITS + 1, Duration::from_secs(1))
                .is_err()
        );
    }

    #[test]
    fn test_window_upper_bound() {
        assert!(ConfigValidator::validate_pool(5, MAX_WINDOW).is_ok());
        assert!(ConfigValidator::validate_pool(5, MAX_WINDOW + Duration::from_secs(1)).is_err());
        assert!(ConfigValidator::validate_pool(5, Duration::MAX).is_err());
    }

    #[test]
    fn test_valid_endpoint() {
        assert!(ConfigValidator::validate_endpoint("https://ismp.crpt.ru/api/v3/lk/documents/create").is_ok());
        assert!(ConfigValidator::validate_endpoint("http://127.0.0.1:8080/create").is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(ConfigValidator::validate_endpoint("").is_err());
        assert!(ConfigValidator::validate_endpoint("ftp://example.com").is_err());
    }

    #[test]
    fn test_invalid_queue() {
        assert!(ConfigValidator::validate_queue(4, 64).is_ok());
        assert!(ConfigValidator::validate_queue(0, 64).is_err());
        assert!(ConfigValidator::validate_queue(4, 0).is_err());
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(ConfigValidator::validate_timeout(Duration::from_secs(10)).is_ok());
        assert!(ConfigValidator::validate_timeout(Duration::ZERO).is_err());
    }
}
