use crate::blockchain::core::block::{Block, BlockOutputs};
use crate::blockchain::core::state::BlockOverlay;
use crate::blockchain::core::validation::validate_no_double_spend;
use crate::config::ChainConfig;
use crate::crypto::Hash;
use crate::error::{BlockRejectReason, ChainError, RejectReason, Result};
use crate::persistence::{Store, StoreError};
use crate::script::Script;
use crate::transaction::{IssuedAmounts, Tx};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Called with every block that lands.
pub type BlockCallback = Box<dyn Fn(&Block) + Send + Sync>;

/// The chain core. Owns no ledger state itself: every read and write goes
/// through the [`Store`], which serializes competing writers. A `FedChain`
/// is shared between threads behind an `Arc`.
pub struct FedChain {
    store: Arc<dyn Store>,
    config: ChainConfig,
    block_program: Option<Script>,
    block_callbacks: RwLock<Vec<BlockCallback>>,
}

impl FedChain {
    pub fn new(store: Arc<dyn Store>, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let block_program = config.block_program()?;
        Ok(FedChain {
            store,
            config,
            block_program,
            block_callbacks: RwLock::new(Vec::new()),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Validates `tx` and applies it to the store as pending. Submitting a
    /// transaction that is already known, pending or confirmed, succeeds
    /// without effect.
    pub fn add_tx(&self, tx: &Tx) -> Result<()> {
        let hash = tx.hash();
        if let Some(status) = self.store.tx_status(&hash)? {
            debug!("Transaction {} already known ({:?})", tx.hash_str(), status);
            return Ok(());
        }

        tx.validate_size(self.config.max_tx_size)?;
        let spent = match tx.validate(&*self.store) {
            Ok(spent) => spent,
            Err(ChainError::TxRejected(reason)) => {
                // a concurrent admission of this very transaction makes its
                // own inputs look spent
                if self.store.tx_status(&hash)?.is_some() {
                    debug!("Transaction {} admitted concurrently", tx.hash_str());
                    return Ok(());
                }
                warn!("Rejected transaction {}: {}", tx.hash_str(), reason);
                return Err(ChainError::TxRejected(reason));
            }
            Err(e) => return Err(e),
        };
        let issued = tx.issued_amounts(&spent);

        match self.store.apply_tx(tx, &issued) {
            Ok(()) => {
                info!(
                    "Admitted transaction {} ({} inputs, {} outputs)",
                    tx.hash_str(),
                    tx.inputs().len(),
                    tx.outputs().len()
                );
                Ok(())
            }
            Err(StoreError::AlreadyKnown(_)) => {
                debug!("Transaction {} admitted concurrently", tx.hash_str());
                Ok(())
            }
            Err(StoreError::OutputSpent(outpoint)) => {
                warn!("Rejected transaction {}: {} spent concurrently", tx.hash_str(), outpoint);
                Err(RejectReason::DoubleSpend(outpoint).into())
            }
            Err(StoreError::MissingOutput(outpoint)) => Err(RejectReason::MissingOutput(outpoint).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Assembles a block from the pending pool in admission order, up to
    /// `max_block_txs`. A pending transaction that spends an output already
    /// claimed by an earlier selected one is left out. The block is
    /// returned unsigned and the store is not modified.
    pub fn generate_block(&self, timestamp: DateTime<Utc>) -> Result<(Block, BlockOutputs)> {
        let pending = self.store.pending_txs()?;
        let pending_count = pending.len();

        let mut claimed = HashSet::new();
        let mut selected = Vec::new();
        for tx in pending {
            if selected.len() >= self.config.max_block_txs {
                break;
            }
            if let Some(outpoint) = tx.spends().find(|op| claimed.contains(*op)) {
                warn!(
                    "Leaving transaction {} out of block: {} already spent in this block",
                    tx.hash_str(),
                    outpoint
                );
                continue;
            }
            claimed.extend(tx.spends().copied());
            selected.push(tx);
        }

        let block = Block::new(timestamp.timestamp_millis().max(0) as u64, selected);
        let outputs = block.outputs();
        debug!(
            "Generated block {} with {} of {} pending transactions",
            hex::encode(block.hash()),
            block.transactions.len(),
            pending_count
        );
        Ok((block, outputs))
    }

    /// Runs every check `add_block` would, except the signature policy,
    /// without touching the store. Signers use it to vet a candidate.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        self.prepare_block(block).map(|_| ())
    }

    /// Validates and lands `block`. Transactions already known are only
    /// confirmed; unseen ones are validated in block order, each seeing the
    /// effects of the ones before it. Any invalid transaction rejects the
    /// whole block. Empty blocks are accepted and ignored.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        if block.is_empty() {
            debug!("Ignoring empty block");
            return Ok(());
        }

        self.check_block_signature(block)?;
        let issued = self.prepare_block(block)?;

        let landed = match self.store.apply_block(block, &issued) {
            Ok(landed) => landed,
            Err(StoreError::OutputSpent(outpoint)) | Err(StoreError::MissingOutput(outpoint)) => {
                warn!(
                    "Rejected block {}: {} claimed while landing",
                    hex::encode(block.hash()),
                    outpoint
                );
                return Err(ChainError::BlockRejected(BlockRejectReason::Conflict(outpoint)));
            }
            Err(e) => return Err(e.into()),
        };
        if !landed {
            debug!("Block {} already landed", hex::encode(block.hash()));
            return Ok(());
        }

        info!(
            "Landed block {} with {} transactions ({} unseen)",
            hex::encode(block.hash()),
            block.transactions.len(),
            issued.len()
        );
        for callback in self.block_callbacks.read().iter() {
            callback(block);
        }
        Ok(())
    }

    pub fn add_block_callback<F>(&self, callback: F)
    where
        F: Fn(&Block) + Send + Sync + 'static,
    {
        self.block_callbacks.write().push(Box::new(callback));
    }

    pub fn latest_block(&self) -> Result<Option<Block>> {
        Ok(self.store.latest_block()?)
    }

    fn check_block_signature(&self, block: &Block) -> Result<()> {
        if let Some(program) = &self.block_program {
            program
                .verify(&block.signature, &block.signable_message())
                .map_err(|reason| {
                    warn!("Rejected block {}: {}", hex::encode(block.hash()), reason);
                    ChainError::BlockRejected(BlockRejectReason::BadSignature(reason))
                })?;
        }
        Ok(())
    }

    /// Validates the unseen transactions of `block` and computes what each
    /// of them mints.
    fn prepare_block(&self, block: &Block) -> Result<HashMap<Hash, IssuedAmounts>> {
        validate_no_double_spend(block).map_err(ChainError::BlockRejected)?;

        let mut overlay = BlockOverlay::new(&*self.store);
        let mut issued = HashMap::new();
        for (index, tx) in block.transactions.iter().enumerate() {
            if self.store.tx_status(&tx.hash())?.is_some() {
                continue;
            }

            let checked = tx
                .validate_size(self.config.max_tx_size)
                .map_err(ChainError::TxRejected)
                .and_then(|()| tx.validate(&overlay));
            let spent = match checked {
                Ok(spent) => spent,
                Err(ChainError::TxRejected(_)) if self.store.tx_status(&tx.hash())?.is_some() => {
                    // admitted by a concurrent add_tx since the check above
                    debug!("Block transaction {} admitted concurrently", tx.hash_str());
                    continue;
                }
                Err(ChainError::TxRejected(reason)) => {
                    warn!(
                        "Rejected block {}: transaction {} at index {}: {}",
                        hex::encode(block.hash()),
                        tx.hash_str(),
                        index,
                        reason
                    );
                    return Err(ChainError::BlockRejected(BlockRejectReason::Transaction {
                        index,
                        hash: tx.hash(),
                        reason,
                    }));
                }
                Err(e) => return Err(e),
            };

            issued.insert(tx.hash(), tx.issued_amounts(&spent));
            overlay.apply(tx);
        }
        Ok(issued)
    }
}
