use crate::domain::entities::StateBlock;
use crate::shared::types::{Address, BlockHash, BlockSubtype, Raw};

/// What a new block should do to its account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Send { destination: Address, amount: Raw },
    Receive { source: BlockHash, amount: Raw },
    Change { representative: Address },
}

impl Operation {
    pub fn amount(&self) -> Raw {
        match self {
            Operation::Send { amount, .. } | Operation::Receive { amount, .. } => *amount,
            Operation::Change { .. } => 0,
        }
    }
}

/// Lifecycle of a block on its way to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStage {
    Draft,
    Validated,
    Signed,
    WorkAttached,
    Submitted,
    Confirmed,
    Rejected,
}

/// Result of re-fetching and checking an account's frontier block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontierCheck {
    Verified(StateBlock),
    Unopened,
    Mismatch(String),
}

/// A block the node accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedBlock {
    pub hash: BlockHash,
    pub block: StateBlock,
    pub subtype: BlockSubtype,
    pub amount: Raw,
}

/// Block under construction together with its stage
#[derive(Debug, Clone)]
pub struct PendingBlock {
    pub block: StateBlock,
    pub subtype: BlockSubtype,
    pub amount: Raw,
    stage: BlockStage,
}

impl PendingBlock {
    pub(crate) fn new(block: StateBlock, subtype: BlockSubtype, amount: Raw) -> Self {
        Self { block, subtype, amount, stage: BlockStage::Draft }
    }

    pub fn stage(&self) -> BlockStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, stage: BlockStage) {
        log::debug!("{} block for {}: {:?} -> {:?}", self.subtype.as_str(), self.block.account, self.stage, stage);
        self.stage = stage;
    }
}
