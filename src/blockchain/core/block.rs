use crate::crypto::{Hash, KeyPair};
use crate::script::Witness;
use crate::transaction::{Outpoint, Tx, TxOutput};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A batch of transactions plus the federation's signature over it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Unix time in milliseconds.
    pub timestamp: u64,
    pub transactions: Vec<Tx>,
    /// Filled in by the external signing step; never part of the block hash.
    #[serde(default)]
    pub signature: Witness,
}

impl Block {
    pub fn new(timestamp: u64, transactions: Vec<Tx>) -> Self {
        Block {
            timestamp,
            transactions,
            signature: Witness::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn calculate_tx_root(transactions: &[Tx]) -> Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }

    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(b"fedchain/block");
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.transactions.len() as u64).to_le_bytes());
        hasher.update(Block::calculate_tx_root(&self.transactions));
        hasher.finalize().into()
    }

    /// Payload the federation signs.
    pub fn signable_message(&self) -> Vec<u8> {
        self.hash().to_vec()
    }

    /// Adds one signer's signature.
    pub fn sign(&mut self, keypair: &KeyPair) {
        let message = self.signable_message();
        self.signature.sign(keypair, &message);
    }

    pub fn outputs(&self) -> BlockOutputs {
        BlockOutputs::from_transactions(&self.transactions)
    }
}

/// Net effect of a block on the unspent output set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOutputs {
    /// Previously existing outputs the block consumes.
    pub spent: Vec<Outpoint>,
    /// Outputs the block creates and leaves unspent.
    pub created: Vec<(Outpoint, TxOutput)>,
}

impl BlockOutputs {
    pub fn from_transactions(transactions: &[Tx]) -> Self {
        let mut created = Vec::new();
        let mut created_here = HashSet::new();
        let mut consumed = HashSet::new();
        let mut spent = Vec::new();

        for tx in transactions {
            for previous in tx.spends() {
                if created_here.contains(previous) {
                    consumed.insert(*previous);
                } else {
                    spent.push(*previous);
                }
            }
            for (outpoint, output) in tx.outpoints() {
                created_here.insert(outpoint);
                created.push((outpoint, output.clone()));
            }
        }
        created.retain(|(outpoint, _)| !consumed.contains(outpoint));

        BlockOutputs { spent, created }
    }
}
