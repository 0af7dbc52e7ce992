use log::{error, info, warn};
use std::sync::Arc;

use super::operation::{BlockStage, FrontierCheck, Operation, PendingBlock, SubmittedBlock};
use crate::core::crypto::keys::{decode_address, verify_signature};
use crate::core::crypto::signer::{BlockSigner, SignOutcome};
use crate::core::gateway::BackendGateway;
use crate::core::work::WorkCache;
use crate::domain::entities::{Account, StateBlock};
use crate::shared::constants::{DEFAULT_REPRESENTATIVE, DEFAULT_UPGRADE_SIGNER};
use crate::shared::error::WalletError;
use crate::shared::types::{Address, BlockHash, BlockSubtype, DifficultyTier, PublicKey};
use crate::shared::WalletResult;

#[derive(Debug, Clone)]
pub struct BuilderSettings {
    /// Representative for accounts opened by this wallet
    pub default_representative: Address,
    /// Keys allowed to sign epoch blocks on behalf of the network
    pub upgrade_signers: Vec<PublicKey>,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            default_representative: DEFAULT_REPRESENTATIVE.to_string(),
            upgrade_signers: DEFAULT_UPGRADE_SIGNER.parse().into_iter().collect(),
        }
    }
}

pub struct BlockBuilder {
    gateway: Arc<BackendGateway>,
    work: Arc<WorkCache>,
    default_representative: PublicKey,
    upgrade_signers: Vec<PublicKey>,
}

impl BlockBuilder {
    pub fn new(
        gateway: Arc<BackendGateway>,
        work: Arc<WorkCache>,
        settings: BuilderSettings,
    ) -> WalletResult<Self> {
        let default_representative = decode_address(&settings.default_representative)
            .map_err(|e| WalletError::config(format!("Invalid default representative: {}", e)))?;
        Ok(Self {
            gateway,
            work,
            default_representative,
            upgrade_signers: settings.upgrade_signers,
        })
    }

    /// Build the unsigned block for `operation` from the account snapshot.
    /// All local validation happens here, before any network call.
    pub fn draft(&self, account: &Account, operation: &Operation) -> WalletResult<PendingBlock> {
        let current_representative = match &account.representative {
            Some(address) => decode_address(address)?,
            None => self.default_representative,
        };
        let previous = account.frontier.unwrap_or(BlockHash::ZERO);

        let (balance, link, representative, subtype) = match operation {
            Operation::Send { destination, amount } => {
                let destination = decode_address(destination)
                    .map_err(|e| WalletError::validation(format!("Invalid destination: {}", e)))?;
                if *amount == 0 {
                    return Err(WalletError::validation("Amount must be greater than zero"));
                }
                if !account.is_opened() {
                    return Err(WalletError::validation("Cannot send from an unopened account"));
                }
                let balance = account.balance.checked_sub(*amount).ok_or_else(|| {
                    WalletError::validation(format!(
                        "Amount {} exceeds balance {}",
                        amount, account.balance
                    ))
                })?;
                (balance, destination.into(), current_representative, BlockSubtype::Send)
            }
            Operation::Receive { source, amount } => {
                if *amount == 0 {
                    return Err(WalletError::validation("Amount must be greater than zero"));
                }
                let balance = account
                    .balance
                    .checked_add(*amount)
                    .ok_or_else(|| WalletError::validation("Receive would overflow the balance"))?;
                let subtype = if account.is_opened() { BlockSubtype::Receive } else { BlockSubtype::Open };
                (balance, *source, current_representative, subtype)
            }
            Operation::Change { representative } => {
                if !account.is_opened() {
                    return Err(WalletError::validation(
                        "Cannot change the representative of an unopened account",
                    ));
                }
                let representative = decode_address(representative).map_err(|e| {
                    WalletError::validation(format!("Invalid representative: {}", e))
                })?;
                (account.balance, BlockHash::ZERO, representative, BlockSubtype::Change)
            }
        };

        let block = StateBlock {
            account: account.public_key,
            previous,
            representative,
            balance,
            link,
            signature: None,
            work: None,
        };
        Ok(PendingBlock::new(block, subtype, operation.amount()))
    }

    /// Re-fetch the account's frontier block and check it against the snapshot
    pub async fn check_frontier(&self, account: &Account) -> WalletResult<FrontierCheck> {
        let Some(frontier) = account.frontier else {
            return Ok(FrontierCheck::Unopened);
        };

        let mut blocks = self.gateway.blocks_info(&[frontier]).await?;
        let Some(info) = blocks.remove(&frontier) else {
            return Ok(FrontierCheck::Mismatch(format!("Frontier {} is unknown to the node", frontier)));
        };

        let block = match StateBlock::from_json(&info.contents) {
            Ok(block) => block,
            Err(e) => return Ok(FrontierCheck::Mismatch(format!("Frontier is not a state block: {}", e))),
        };
        let Some(subtype) = info.subtype else {
            return Ok(FrontierCheck::Mismatch("Frontier has no known subtype".into()));
        };

        if block.hash() != frontier {
            return Ok(FrontierCheck::Mismatch(format!(
                "Frontier contents hash to {} instead of {}",
                block.hash(),
                frontier
            )));
        }
        if block.account != account.public_key {
            return Ok(FrontierCheck::Mismatch("Frontier belongs to another account".into()));
        }
        if block.balance != account.balance {
            return Ok(FrontierCheck::Mismatch(format!(
                "Frontier balance {} differs from known balance {}",
                block.balance, account.balance
            )));
        }
        if let Some(address) = &account.representative {
            if decode_address(address)? != block.representative {
                return Ok(FrontierCheck::Mismatch("Frontier representative differs".into()));
            }
        }

        let signed = match (subtype, &block.signature) {
            (BlockSubtype::Epoch, Some(signature)) => {
                let hash = block.hash();
                self.upgrade_signers
                    .iter()
                    .any(|signer| verify_signature(signer, &hash, signature))
            }
            _ => block.verify_signature(&account.public_key),
        };
        if !signed {
            return Ok(FrontierCheck::Mismatch("Frontier signature does not verify".into()));
        }

        Ok(FrontierCheck::Verified(block))
    }

    /// Run `operation` through the whole lifecycle and submit it
    pub async fn build_and_submit(
        &self,
        account: &Account,
        operation: Operation,
        signer: &dyn BlockSigner,
    ) -> WalletResult<SubmittedBlock> {
        let mut pending = self.draft(account, &operation)?;

        match self.check_frontier(account).await? {
            FrontierCheck::Verified(frontier) => {
                if !matches!(operation, Operation::Change { .. }) {
                    pending.block.representative = frontier.representative;
                }
                signer.prepare(account.index, &frontier).await?;
            }
            FrontierCheck::Unopened => {}
            FrontierCheck::Mismatch(reason) => {
                error!("Chain integrity check failed for {}: {}", account.address, reason);
                return Err(WalletError::chain_integrity(reason));
            }
        }
        pending.advance(BlockStage::Validated);

        let hash = pending.block.hash();
        match signer.sign(account.index, &pending.block).await? {
            SignOutcome::Signed(signature) => pending.block.signature = Some(signature),
            SignOutcome::Denied => {
                warn!("Signing denied for {}", account.address);
                return Err(WalletError::SigningDenied(account.index));
            }
        }
        if !pending.block.verify_signature(&account.public_key) {
            return Err(WalletError::crypto("Signer produced a signature that does not verify"));
        }
        pending.advance(BlockStage::Signed);

        let root = pending.block.work_root();
        let work = self.work.get(root, pending.subtype.required_tier()).await?;
        pending.block.work = Some(work);
        pending.advance(BlockStage::WorkAttached);

        pending.advance(BlockStage::Submitted);
        let accepted = match self.gateway.process(&pending.block, pending.subtype).await {
            Ok(accepted) => accepted,
            Err(e) => {
                pending.advance(BlockStage::Rejected);
                return Err(e);
            }
        };
        if accepted != hash {
            pending.advance(BlockStage::Rejected);
            return Err(WalletError::rejected(format!(
                "Node accepted {} but the block hashes to {}",
                accepted, hash
            )));
        }
        pending.advance(BlockStage::Confirmed);
        info!("{} block {} accepted for {}", pending.subtype.as_str(), hash, account.address);

        self.work.invalidate(&root);
        self.work.precompute(hash, DifficultyTier::Full);

        Ok(SubmittedBlock {
            hash,
            block: pending.block,
            subtype: pending.subtype,
            amount: pending.amount,
        })
    }
}
