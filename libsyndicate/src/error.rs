//! Error types for Syndicate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyndicateError>;

#[derive(Error, Debug)]
pub enum SyndicateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Content item {0} not found")]
    ContentNotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyndicateError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicateError::InvalidInput(_) => 3,
            SyndicateError::ContentNotFound(_) => 3,
            SyndicateError::Platform(PlatformError::CredentialUnavailable(_)) => 2,
            SyndicateError::Vault(_) => 2,
            SyndicateError::Platform(_) => 1,
            SyndicateError::Config(_) => 1,
            SyndicateError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Vault failures. Decryption problems deliberately collapse into a single
/// variant so callers cannot distinguish a truncated blob from a wrong key
/// or tampered ciphertext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Decryption failed: blob is malformed, corrupted, or the key is wrong")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("No usable credential: {0}")]
    CredentialUnavailable(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Publish timed out after {0}s")]
    Timeout(u64),

    #[error("Publish cancelled: {0}")]
    Cancelled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = SyndicateError::InvalidInput("missing content id".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_content_not_found() {
        assert_eq!(SyndicateError::ContentNotFound(42).exit_code(), 3);
    }

    #[test]
    fn test_exit_code_credential_unavailable() {
        let error = SyndicateError::Platform(PlatformError::CredentialUnavailable(
            "no active credential for discord".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_vault_error() {
        let error = SyndicateError::Vault(VaultError::DecryptionFailed);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_publish_error() {
        let error = SyndicateError::Platform(PlatformError::Publish("remote API 500".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = SyndicateError::Config(ConfigError::MissingField("vault.secret".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_unsupported() {
        let error = SyndicateError::Platform(PlatformError::Unsupported("myspace".to_string()));
        assert_eq!(
            format!("{}", error),
            "Platform error: Unsupported platform: myspace"
        );
    }

    #[test]
    fn test_error_message_formatting_timeout() {
        let error = PlatformError::Timeout(30);
        assert_eq!(format!("{}", error), "Publish timed out after 30s");
    }

    #[test]
    fn test_error_conversion_from_vault_error() {
        let error: SyndicateError = VaultError::DecryptionFailed.into();
        assert!(matches!(error, SyndicateError::Vault(_)));
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("connection refused".to_string());
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
