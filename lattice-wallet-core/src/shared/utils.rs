//! Utility functions for the wallet core
//!
//! This module contains common utility functions used throughout the wallet core.

use crate::shared::error::WalletError;
use crate::shared::types::Raw;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Generate a unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse a raw amount from its decimal string form
pub fn parse_raw(value: &str) -> Result<Raw, WalletError> {
    value
        .trim()
        .parse::<Raw>()
        .map_err(|e| WalletError::validation(format!("Invalid raw amount '{}': {}", value, e)))
}

/// Read a raw amount from a JSON field that may be a string or a number
pub fn raw_from_json(value: &Value) -> Option<Raw> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(Raw::from),
        _ => None,
    }
}

/// Check that `value` is exactly `len` hexadecimal characters
pub fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), WalletError> {
    if password.len() < 8 {
        return Err(WalletError::validation("Password must be at least 8 characters long"));
    }

    if password.len() > 128 {
        return Err(WalletError::validation("Password must be at most 128 characters long"));
    }

    Ok(())
}

/// Clears an in-progress flag when dropped, however the guarded run ends
pub(crate) struct FlagGuard<'a>(pub(crate) &'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
