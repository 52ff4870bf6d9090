//! fedchain - the core of a federated, multi-asset UTXO ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, block assembly and the chain core ([`FedChain`])
//! - [`transaction`] - Transaction types, validation and issuance accounting
//!
//! ## Authorization
//! - [`script`] - Output locks, issuance programs and witnesses
//! - [`crypto`] - Hashing, keys and signatures (secp256k1)
//!
//! ## State Management
//! - [`persistence`] - The store contract plus in-memory and SQLite backends
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Authorization
// ============================================================================
pub mod crypto;
pub mod script;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

#[cfg(test)]
mod testutil;

pub use blockchain::{Block, BlockOutputs, FedChain};
pub use error::{ChainError, Result};
pub use persistence::{open_store, MemStore, SqliteStore, Store};
