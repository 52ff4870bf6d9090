//! Error types for fedchain

use crate::crypto::Hash;
use crate::persistence::StoreError;
use crate::script::ScriptError;
use crate::transaction::{AssetId, Outpoint};
use thiserror::Error;

/// Why a transaction was refused by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("transaction too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("input references unknown output {0}")]
    MissingOutput(Outpoint),

    #[error("output {0} is already spent")]
    DoubleSpend(Outpoint),

    #[error("input {input} is not authorized: {reason}")]
    BadSignature { input: usize, reason: ScriptError },

    #[error("asset {asset} is unbalanced: inputs {inputs}, outputs {outputs}")]
    Unbalanced {
        asset: AssetId,
        inputs: u64,
        outputs: u64,
    },
}

/// Why a whole block was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejectReason {
    #[error("block signature does not satisfy the federation policy: {0}")]
    BadSignature(ScriptError),

    #[error("transaction {} appears more than once", hex::encode(.0))]
    DuplicateTransaction(Hash),

    #[error(
        "transactions {} and {} both spend {outpoint}",
        hex::encode(.first),
        hex::encode(.second)
    )]
    ConflictingSpend {
        outpoint: Outpoint,
        first: Hash,
        second: Hash,
    },

    /// A spend target was claimed by a concurrent admission after the block
    /// was validated.
    #[error("output {0} was spent before the block landed")]
    Conflict(Outpoint),

    #[error("transaction {index} ({}) rejected: {reason}", hex::encode(.hash))]
    Transaction {
        index: usize,
        hash: Hash,
        reason: RejectReason,
    },
}

#[derive(Debug, Error)]
pub enum ChainError {
    /// Root cause of every validation failure in `add_tx`.
    #[error("transaction rejected: {0}")]
    TxRejected(RejectReason),

    #[error("block rejected: {0}")]
    BlockRejected(BlockRejectReason),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChainError {
    /// True when the failure is a transaction rejection, whether raised by
    /// `add_tx` directly or by a block transaction during `add_block`.
    pub fn is_tx_rejected(&self) -> bool {
        matches!(
            self,
            ChainError::TxRejected(_)
                | ChainError::BlockRejected(BlockRejectReason::Transaction { .. })
        )
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            ChainError::TxRejected(reason) => Some(reason),
            ChainError::BlockRejected(BlockRejectReason::Transaction { reason, .. }) => Some(reason),
            _ => None,
        }
    }
}

impl From<RejectReason> for ChainError {
    fn from(reason: RejectReason) -> Self {
        ChainError::TxRejected(reason)
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_transaction_rejection_counts_as_tx_rejected() {
        let reason = RejectReason::Malformed("no inputs".to_string());
        let err = ChainError::BlockRejected(BlockRejectReason::Transaction {
            index: 2,
            hash: [7u8; 32],
            reason: reason.clone(),
        });
        assert!(err.is_tx_rejected());
        assert_eq!(err.reject_reason(), Some(&reason));

        let err = ChainError::BlockRejected(BlockRejectReason::DuplicateTransaction([1u8; 32]));
        assert!(!err.is_tx_rejected());
        assert!(err.reject_reason().is_none());
    }

    #[test]
    fn test_store_errors_are_transparent() {
        let err: ChainError = StoreError::Database("disk full".to_string()).into();
        assert!(!err.is_tx_rejected());
        assert_eq!(err.to_string(), "database error: disk full");
    }
}
