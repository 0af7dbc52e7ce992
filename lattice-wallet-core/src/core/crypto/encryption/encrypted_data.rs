use serde::{Deserialize, Serialize};

/// Password-encrypted secret as it appears in the wallet export:
/// hex nonce, hex Argon2 salt, hex ciphertext (tag appended).
/// Hardware wallets carry no secret and leave all three empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptedData {
    #[serde(default)]
    pub iv: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub encrypted: String,
}

impl EncryptedData {
    pub fn is_empty(&self) -> bool {
        self.encrypted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypted_data_serializes_flat() {
        let data = EncryptedData {
            iv: "00".repeat(12),
            salt: "11".repeat(16),
            encrypted: "ab".to_string(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["encrypted"], "ab");
        assert_eq!(json["iv"].as_str().unwrap().len(), 24);
    }
}
