use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::shared::constants::{PRIVATE_KEY_SIZE, SIGNATURE_SIZE};
use crate::shared::error::WalletError;
use crate::shared::types::{BlockHash, PublicKey};

/// Account signing key. The inner key is zeroized on drop.
pub struct SecurePrivateKey {
    signing_key: SigningKey,
}

impl SecurePrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let bytes: [u8; PRIVATE_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| WalletError::crypto("Invalid private key length"))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, WalletError> {
        let bytes = zeroize::Zeroizing::new(hex::decode(hex_key.trim())?);
        Self::from_bytes(&bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a block hash
    pub fn sign(&self, hash: &BlockHash) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(hash.as_bytes()).to_bytes()
    }
}

// No Debug implementation to prevent key exposure in logs
// No Clone implementation to prevent accidental key duplication

/// Verify a block signature against an account key
pub fn verify_signature(public_key: &PublicKey, hash: &BlockHash, signature: &[u8; SIGNATURE_SIZE]) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(public_key.as_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(hash.as_bytes(), &signature).is_ok()
}
