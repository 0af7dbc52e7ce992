use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::Argon2;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use super::EncryptedData;
use crate::shared::constants::{NONCE_SIZE, SALT_SIZE};
use crate::shared::error::WalletError;
use crate::shared::WalletResult;

/// Password-based secret encryption: Argon2id key derivation, AES-256-GCM
pub struct EncryptionManager {
    argon2: Argon2<'static>,
}

impl EncryptionManager {
    pub fn new(argon2: Argon2<'static>) -> Self {
        Self { argon2 }
    }

    pub fn new_default() -> Self {
        Self::new(Argon2::default())
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> WalletResult<Zeroizing<[u8; 32]>> {
        let mut key = Zeroizing::new([0u8; 32]);
        self.argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])?;
        Ok(key)
    }

    /// Encrypt `secret` under a key derived from `password`
    pub fn encrypt(&self, secret: &[u8], password: &str) -> WalletResult<EncryptedData> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), secret)
            .map_err(|e| WalletError::crypto(format!("AES-GCM encryption failed: {}", e)))?;

        Ok(EncryptedData {
            iv: hex::encode(nonce),
            salt: hex::encode(salt),
            encrypted: hex::encode(ciphertext),
        })
    }

    /// Decrypt a secret; a wrong password surfaces as a crypto error
    pub fn decrypt(&self, data: &EncryptedData, password: &str) -> WalletResult<Zeroizing<Vec<u8>>> {
        let nonce = hex::decode(&data.iv)?;
        let salt = hex::decode(&data.salt)?;
        let ciphertext = hex::decode(&data.encrypted)?;

        if nonce.len() != NONCE_SIZE {
            return Err(WalletError::crypto("Invalid nonce length"));
        }

        let key = self.derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| WalletError::crypto("Decryption failed: wrong password or corrupted data"))?;

        Ok(Zeroizing::new(plaintext))
    }
}

impl Default for EncryptionManager {
    fn default() -> Self {
        Self::new_default()
    }
}
