//! In-memory store, thread-safe, used by tests and ephemeral runs.

use super::{OutputState, StateView, Store, StoreError, TxStatus};
use crate::blockchain::Block;
use crate::crypto::Hash;
use crate::transaction::{Amount, AssetId, IssuedAmounts, Outpoint, Tx, TxOutput};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
struct OutputEntry {
    output: TxOutput,
    spent: bool,
}

#[derive(Debug, Clone, Default)]
struct MemState {
    outputs: HashMap<Outpoint, OutputEntry>,
    txs: HashMap<Hash, TxStatus>,
    /// Pending transactions keyed by admission sequence.
    pending: BTreeMap<u64, Tx>,
    pending_seq: HashMap<Hash, u64>,
    next_seq: u64,
    supply: HashMap<AssetId, Amount>,
    blocks: Vec<Block>,
    block_hashes: HashSet<Hash>,
}

impl MemState {
    fn output_state(&self, outpoint: &Outpoint) -> OutputState {
        match self.outputs.get(outpoint) {
            Some(entry) if entry.spent => OutputState::Spent,
            Some(entry) => OutputState::Unspent(entry.output.clone()),
            None => OutputState::Unknown,
        }
    }

    /// Checks every precondition before mutating anything.
    fn apply_tx(&mut self, tx: &Tx, issued: &IssuedAmounts, status: TxStatus) -> Result<(), StoreError> {
        let hash = tx.hash();
        if self.txs.contains_key(&hash) {
            return Err(StoreError::AlreadyKnown(hash));
        }
        for previous in tx.spends() {
            match self.outputs.get(previous) {
                None => return Err(StoreError::MissingOutput(*previous)),
                Some(entry) if entry.spent => return Err(StoreError::OutputSpent(*previous)),
                Some(_) => {}
            }
        }
        let mut supply_updates = Vec::with_capacity(issued.len());
        for (asset, amount) in issued {
            let current = self.supply.get(asset).copied().unwrap_or(0);
            let total = current
                .checked_add(*amount)
                .ok_or(StoreError::SupplyOverflow(*asset))?;
            supply_updates.push((*asset, total));
        }

        for previous in tx.spends() {
            if let Some(entry) = self.outputs.get_mut(previous) {
                entry.spent = true;
            }
        }
        for (outpoint, output) in tx.outpoints() {
            self.outputs.insert(
                outpoint,
                OutputEntry {
                    output: output.clone(),
                    spent: false,
                },
            );
        }
        self.supply.extend(supply_updates);
        self.txs.insert(hash, status);
        if status == TxStatus::Pending {
            self.push_pending(tx);
        }
        Ok(())
    }

    fn push_pending(&mut self, tx: &Tx) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq, tx.clone());
        self.pending_seq.insert(tx.hash(), seq);
    }

    fn apply_block(&mut self, block: &Block, issued: &HashMap<Hash, IssuedAmounts>) -> Result<bool, StoreError> {
        let block_hash = block.hash();
        if self.block_hashes.contains(&block_hash) {
            return Ok(false);
        }

        for tx in &block.transactions {
            let hash = tx.hash();
            match self.txs.get(&hash).copied() {
                Some(TxStatus::Confirmed) => {}
                Some(TxStatus::Pending) => {
                    self.txs.insert(hash, TxStatus::Confirmed);
                    if let Some(seq) = self.pending_seq.remove(&hash) {
                        self.pending.remove(&seq);
                    }
                }
                None => {
                    let amounts = issued.get(&hash).ok_or_else(|| {
                        StoreError::Inconsistent(format!(
                            "block transaction {} is unknown and was not validated",
                            tx.hash_str()
                        ))
                    })?;
                    self.apply_tx(tx, amounts, TxStatus::Confirmed)?;
                }
            }
        }

        self.blocks.push(block.clone());
        self.block_hashes.insert(block_hash);
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outputs ever created, spent or not.
    pub fn output_count(&self) -> usize {
        self.state.lock().outputs.len()
    }
}

impl StateView for MemStore {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
        Ok(self.state.lock().output_state(outpoint))
    }
}

impl Store for MemStore {
    fn tx_status(&self, hash: &Hash) -> Result<Option<TxStatus>, StoreError> {
        Ok(self.state.lock().txs.get(hash).copied())
    }

    fn apply_tx(&self, tx: &Tx, issued: &IssuedAmounts) -> Result<(), StoreError> {
        self.state.lock().apply_tx(tx, issued, TxStatus::Pending)
    }

    fn apply_block(&self, block: &Block, issued: &HashMap<Hash, IssuedAmounts>) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        if state.block_hashes.contains(&block.hash()) {
            return Ok(false);
        }
        // Applied to a full copy of the state so a failure halfway through
        // leaves no trace. The copy costs O(state) per block, which is fine
        // for this reference store; SqliteStore rolls back instead.
        let mut next = state.clone();
        next.apply_block(block, issued)?;
        *state = next;
        Ok(true)
    }

    fn pending_txs(&self) -> Result<Vec<Tx>, StoreError> {
        Ok(self.state.lock().pending.values().cloned().collect())
    }

    fn issued_supply(&self, asset: &AssetId) -> Result<Amount, StoreError> {
        Ok(self.state.lock().supply.get(asset).copied().unwrap_or(0))
    }

    fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(self.state.lock().blocks.last().cloned())
    }
}
