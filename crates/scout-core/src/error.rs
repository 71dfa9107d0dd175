use thiserror::Error;

/// Application-wide error types for Scout.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed site or policy entry. Fatal: the run aborts before scraping.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Page could not be loaded (unreachable, non-2xx, timed out).
    #[error("Navigation to {url} failed: {message}")]
    NavigationError { url: String, message: String },

    /// A rendered page could not be turned into listings.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Headless browser could not be launched or driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::NavigationError {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::NavigationError { .. })
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, AppError::NavigationError { .. })
    }
}
