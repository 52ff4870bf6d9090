//! Ledger state store contract and its backends.
//!
//! The chain core only talks to [`Store`]. Each backend must make `apply_tx`
//! and `apply_block` atomic check-and-set operations: either every effect
//! lands or none does, and a transaction hash or unspent output can only be
//! claimed once no matter how many callers race.

pub mod memory;
pub mod sqlite;

pub use memory::MemStore;
pub use sqlite::SqliteStore;

use crate::blockchain::Block;
use crate::config::{DatabaseConfig, StoreBackend};
use crate::crypto::Hash;
use crate::transaction::{Amount, AssetId, IssuedAmounts, Outpoint, Tx, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {} is already known", hex::encode(.0))]
    AlreadyKnown(Hash),

    #[error("output {0} is already spent")]
    OutputSpent(Outpoint),

    #[error("output {0} does not exist")]
    MissingOutput(Outpoint),

    #[error("inconsistent store request: {0}")]
    Inconsistent(String),

    #[error("issued supply of asset {0} overflows")]
    SupplyOverflow(AssetId),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Lifecycle of a known transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Admitted by `add_tx`, effects applied, not yet in a landed block.
    Pending,
    /// Included in a landed block.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputState {
    Unspent(TxOutput),
    Spent,
    Unknown,
}

/// Read access the validator needs.
pub trait StateView {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError>;
}

pub trait Store: StateView + Send + Sync {
    fn tx_status(&self, hash: &Hash) -> Result<Option<TxStatus>, StoreError>;

    /// Atomically spends the transaction's inputs, creates its outputs, adds
    /// `issued` to the supply counters and records the hash as pending.
    ///
    /// Fails with `AlreadyKnown`, `OutputSpent` or `MissingOutput` without
    /// touching state when the hash or any spend target was claimed first.
    fn apply_tx(&self, tx: &Tx, issued: &IssuedAmounts) -> Result<(), StoreError>;

    /// Atomically lands `block`. Known pending transactions are confirmed and
    /// leave the pool without being reapplied; unknown ones are applied with
    /// their entry from `issued` and recorded as confirmed. Re-landing a
    /// recorded block is a no-op returning `false`; `true` means the block
    /// was recorded by this call.
    fn apply_block(&self, block: &Block, issued: &HashMap<Hash, IssuedAmounts>) -> Result<bool, StoreError>;

    /// Pending transactions in admission order.
    fn pending_txs(&self) -> Result<Vec<Tx>, StoreError>;

    /// Total minted so far for `asset`.
    fn issued_supply(&self, asset: &AssetId) -> Result<Amount, StoreError>;

    fn latest_block(&self) -> Result<Option<Block>, StoreError>;
}

impl<S: StateView + ?Sized> StateView for Arc<S> {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
        (**self).output_state(outpoint)
    }
}

/// Builds the backend named by `config`.
pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemStore::new())),
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path)?)),
    }
}
