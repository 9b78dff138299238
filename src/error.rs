use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid subscription: {0}")]
    Validation(String),

    #[error("Failed to fetch subscription, HTTP status: {status}")]
    Network { status: u16 },

    #[error("Subscription request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Subscription config content is empty")]
    EmptyContent,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Persistence(#[from] tokio_rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl AppError {
    /// Failures of the remote endpoint rather than of this process.
    /// `refresh_all` tolerates these per item.
    pub fn is_network_class(&self) -> bool {
        matches!(
            self,
            AppError::Network { .. } | AppError::Timeout { .. } | AppError::EmptyContent | AppError::Http(_)
        )
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_message_carries_status_code() {
        let err = AppError::Network { status: 503 };
        assert!(err.to_string().contains("503"));
        assert!(err.is_network_class());
        assert!(!err.is_persistence());
    }

    #[test]
    fn validation_is_not_network_class() {
        let err = AppError::Validation("empty url".to_string());
        assert!(!err.is_network_class());
        assert!(!err.is_persistence());
    }

    #[test]
    fn storage_errors_are_persistence() {
        let err: AppError = tokio_rusqlite::Error::ConnectionClosed.into();
        assert!(err.is_persistence());
        assert!(!err.is_network_class());
    }
}
