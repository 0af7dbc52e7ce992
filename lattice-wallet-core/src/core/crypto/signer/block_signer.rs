use async_trait::async_trait;

use crate::domain::entities::StateBlock;
use crate::shared::constants::SIGNATURE_SIZE;
use crate::shared::types::PublicKey;
use crate::shared::WalletResult;

/// Result of a signing request. A denial is an answer, not a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Signed([u8; SIGNATURE_SIZE]),
    Denied,
}

/// Signs blocks for the accounts of one wallet, addressed by derivation index
#[async_trait]
pub trait BlockSigner: Send + Sync {
    async fn public_key(&self, index: u32) -> WalletResult<PublicKey>;

    /// Hand over the verified frontier before signing a block extending it
    async fn prepare(&self, _index: u32, _frontier: &StateBlock) -> WalletResult<()> {
        Ok(())
    }

    async fn sign(&self, index: u32, block: &StateBlock) -> WalletResult<SignOutcome>;
}
