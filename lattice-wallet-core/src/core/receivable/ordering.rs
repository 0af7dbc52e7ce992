use std::cmp::Ordering;

use crate::domain::entities::ReceivableBlock;
use crate::shared::types::ReceivePolicy;

fn compare(policy: ReceivePolicy, a: &ReceivableBlock, b: &ReceivableBlock) -> Ordering {
    let primary = match policy {
        ReceivePolicy::Amount => b.amount.cmp(&a.amount),
        // Unknown timestamps go last
        ReceivePolicy::Date => match (a.timestamp, b.timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        ReceivePolicy::Manual => Ordering::Equal,
    };
    primary.then(a.sequence.cmp(&b.sequence))
}

/// Processing order under `policy`: largest amount first, or oldest first.
/// Ties fall back to insertion order.
pub fn order(policy: ReceivePolicy, mut blocks: Vec<ReceivableBlock>) -> Vec<ReceivableBlock> {
    blocks.sort_by(|a, b| compare(policy, a, b));
    blocks
}
