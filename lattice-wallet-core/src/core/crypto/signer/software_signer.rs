use async_trait::async_trait;

use super::{BlockSigner, SignOutcome};
use crate::core::crypto::keys::{SecurePrivateKey, SecureSeed};
use crate::domain::entities::StateBlock;
use crate::shared::error::WalletError;
use crate::shared::types::PublicKey;
use crate::shared::WalletResult;

enum KeyMaterial {
    Seed(SecureSeed),
    Single(SecurePrivateKey),
}

/// Local signer over unlocked key material. Dropping it drops the secrets.
pub struct SoftwareSigner {
    material: KeyMaterial,
}

impl SoftwareSigner {
    pub fn from_seed(seed: SecureSeed) -> Self {
        Self { material: KeyMaterial::Seed(seed) }
    }

    /// A single imported key answers for index 0 only
    pub fn from_private_key(key: SecurePrivateKey) -> Self {
        Self { material: KeyMaterial::Single(key) }
    }

    fn with_key<R>(&self, index: u32, f: impl FnOnce(&SecurePrivateKey) -> R) -> WalletResult<R> {
        match &self.material {
            KeyMaterial::Seed(seed) => {
                let key = seed.derive_key(index)?;
                Ok(f(&key))
            }
            KeyMaterial::Single(key) if index == 0 => Ok(f(key)),
            KeyMaterial::Single(_) => Err(WalletError::validation(format!(
                "Imported key wallet has no account at index {}",
                index
            ))),
        }
    }
}

#[async_trait]
impl BlockSigner for SoftwareSigner {
    async fn public_key(&self, index: u32) -> WalletResult<PublicKey> {
        self.with_key(index, SecurePrivateKey::public_key)
    }

    async fn sign(&self, index: u32, block: &StateBlock) -> WalletResult<SignOutcome> {
        self.with_key(index, |key| {
            if key.public_key() != block.account {
                return Err(WalletError::crypto(format!(
                    "Block account does not belong to index {}",
                    index
                )));
            }
            Ok(SignOutcome::Signed(key.sign(&block.hash())))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::BlockHash;

    fn block_for(account: PublicKey) -> StateBlock {
        StateBlock {
            account,
            previous: BlockHash([1u8; 32]),
            representative: account,
            balance: 10,
            link: BlockHash::ZERO,
            signature: None,
            work: None,
        }
    }

    #[tokio::test]
    async fn test_seed_signer_signs_for_derived_account() {
        let seed = SecureSeed::from_bytes(&[9u8; 32]).unwrap();
        let expected = seed.derive_key(1).unwrap().public_key();
        let signer = SoftwareSigner::from_seed(seed);

        assert_eq!(signer.public_key(1).await.unwrap(), expected);

        let mut block = block_for(expected);
        match signer.sign(1, &block).await.unwrap() {
            SignOutcome::Signed(signature) => block.signature = Some(signature),
            SignOutcome::Denied => panic!("software signer never denies"),
        }
        assert!(block.verify_signature(&expected));
    }

    #[tokio::test]
    async fn test_refuses_foreign_block() {
        let signer = SoftwareSigner::from_seed(SecureSeed::from_bytes(&[9u8; 32]).unwrap());
        let result = signer.sign(0, &block_for(PublicKey([4u8; 32]))).await;
        assert!(matches!(result, Err(WalletError::Crypto(_))));
    }

    #[tokio::test]
    async fn test_single_key_only_answers_index_zero() {
        let signer = SoftwareSigner::from_private_key(SecurePrivateKey::from_bytes(&[5u8; 32]).unwrap());
        assert!(signer.public_key(0).await.is_ok());
        assert!(signer.public_key(1).await.is_err());
    }
}
