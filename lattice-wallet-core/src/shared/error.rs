//! Error handling for the wallet core
//!
//! This module defines the error types used throughout the wallet core.

use thiserror::Error;

/// Wallet error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Every endpoint attempt failed; the node status is offline.
    #[error("Node offline: {0}")]
    Offline(String),

    /// The backend served a frontier that does not verify against local state.
    #[error("Chain integrity error: {0}")]
    ChainIntegrity(String),

    /// The hardware device user rejected the signing request.
    #[error("Signing denied on device for account index {0}")]
    SigningDenied(u32),

    /// The node answered but refused the submitted block.
    #[error("Block rejected: {0}")]
    Rejected(String),

    /// The account or wallet context changed while a request was in flight.
    #[error("Stale context: {0}")]
    StaleContext(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Wallet is locked: {0}")]
    WalletLocked(String),

    #[error("Wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a cryptographic error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self::Offline(message.into())
    }

    /// Create a chain integrity error
    pub fn chain_integrity(message: impl Into<String>) -> Self {
        Self::ChainIntegrity(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleContext(message.into())
    }

    /// Create a wallet not found error
    pub fn wallet_not_found(message: impl Into<String>) -> Self {
        Self::WalletNotFound(message.into())
    }

    pub fn account_not_found(message: impl Into<String>) -> Self {
        Self::AccountNotFound(message.into())
    }

    pub fn wallet_locked(message: impl Into<String>) -> Self {
        Self::WalletLocked(message.into())
    }

    /// Create a wallet already exists error
    pub fn wallet_already_exists(message: impl Into<String>) -> Self {
        Self::WalletAlreadyExists(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result alias used throughout the crate
pub type WalletResult<T> = Result<T, WalletError>;

// Standard library error conversions
impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("IO error: {}", err))
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        Self::validation(format!("Hex decoding error: {}", err))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("Task join error: {}", err))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(format!("HTTP error: {}", err))
    }
}

impl From<config::ConfigError> for WalletError {
    fn from(err: config::ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

// Cryptographic error conversions
impl From<ed25519_dalek::SignatureError> for WalletError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        Self::crypto(format!("Ed25519 error: {}", err))
    }
}

impl From<argon2::Error> for WalletError {
    fn from(err: argon2::Error) -> Self {
        Self::crypto(format!("Argon2 error: {}", err))
    }
}

impl From<aes_gcm::Error> for WalletError {
    fn from(err: aes_gcm::Error) -> Self {
        Self::crypto(format!("AES-GCM error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_creation() {
        let config_error = WalletError::config("Invalid configuration");
        let crypto_error = WalletError::crypto("Encryption failed");
        let validation_error = WalletError::validation("Invalid input");

        assert!(matches!(config_error, WalletError::Config(_)));
        assert!(matches!(crypto_error, WalletError::Crypto(_)));
        assert!(matches!(validation_error, WalletError::Validation(_)));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let wallet_error: WalletError = io_error.into();

        assert!(matches!(wallet_error, WalletError::Storage(_)));
    }

    #[test]
    fn test_error_display() {
        let error = WalletError::SigningDenied(7);
        let display = format!("{}", error);

        assert!(display.contains("Signing denied"));
        assert!(display.contains('7'));
    }
}
