use crate::blockchain::core::block::Block;
use crate::error::BlockRejectReason;
use std::collections::{HashMap, HashSet};

/// Rejects blocks listing a transaction twice or two transactions that
/// consume the same output.
pub fn validate_no_double_spend(block: &Block) -> Result<(), BlockRejectReason> {
    let mut seen_txs = HashSet::new();
    let mut seen_inputs = HashMap::new();
    for tx in &block.transactions {
        let hash = tx.hash();
        if !seen_txs.insert(hash) {
            return Err(BlockRejectReason::DuplicateTransaction(hash));
        }
        for previous in tx.spends() {
            if let Some(first) = seen_inputs.insert(*previous, hash) {
                return Err(BlockRejectReason::ConflictingSpend {
                    outpoint: *previous,
                    first,
                    second: hash,
                });
            }
        }
    }
    Ok(())
}
