use bip39::{Language, Mnemonic};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use super::SecurePrivateKey;
use crate::core::crypto::hashing::blake2b_256;
use crate::shared::constants::SEED_SIZE;
use crate::shared::error::WalletError;

/// Wallet seed wrapper, zeroized on drop
pub struct SecureSeed {
    bytes: Zeroizing<[u8; SEED_SIZE]>,
}

impl SecureSeed {
    /// Generate a fresh random seed
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; SEED_SIZE]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != SEED_SIZE {
            return Err(WalletError::validation("Seed must be 32 bytes"));
        }
        let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
        seed.copy_from_slice(bytes);
        Ok(Self { bytes: seed })
    }

    pub fn from_hex(hex_seed: &str) -> Result<Self, WalletError> {
        let bytes = Zeroizing::new(hex::decode(hex_seed.trim())?);
        Self::from_bytes(&bytes)
    }

    /// The 24-word mnemonic encodes the seed as its entropy
    pub fn from_mnemonic(phrase: &str) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
            .map_err(|e| WalletError::validation(format!("Invalid mnemonic: {}", e)))?;
        let entropy = Zeroizing::new(mnemonic.to_entropy());
        Self::from_bytes(&entropy)
    }

    pub fn to_mnemonic(&self) -> Result<String, WalletError> {
        let mnemonic = Mnemonic::from_entropy(&self.bytes[..])
            .map_err(|e| WalletError::crypto(format!("Mnemonic encoding failed: {}", e)))?;
        Ok(mnemonic.to_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Account key at `index`: blake2b-256(seed || index as big-endian u32)
    pub fn derive_key(&self, index: u32) -> Result<SecurePrivateKey, WalletError> {
        let key = Zeroizing::new(blake2b_256(&[&self.bytes[..], &index.to_be_bytes()[..]]));
        SecurePrivateKey::from_bytes(&key[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = SecureSeed::from_hex(SEED).unwrap();
        let a = seed.derive_key(0).unwrap().public_key();
        let b = seed.derive_key(0).unwrap().public_key();
        let c = seed.derive_key(1).unwrap().public_key();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mnemonic_roundtrip() {
        let seed = SecureSeed::generate();
        let phrase = seed.to_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        let restored = SecureSeed::from_mnemonic(&phrase).unwrap();
        assert_eq!(restored.as_bytes(), seed.as_bytes());
    }

    #[test]
    fn test_invalid_seed_rejected() {
        assert!(SecureSeed::from_hex("abcd").is_err());
        assert!(SecureSeed::from_mnemonic("not a real mnemonic phrase").is_err());
    }
}
