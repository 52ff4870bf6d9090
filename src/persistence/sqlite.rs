//! Durable store backed by SQLite.

use super::{OutputState, StateView, Store, StoreError, TxStatus};
use crate::blockchain::Block;
use crate::crypto::Hash;
use crate::transaction::{Amount, AssetId, IssuedAmounts, Outpoint, Tx, TxOutput};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS outputs (
        tx_hash BLOB NOT NULL,
        idx INTEGER NOT NULL,
        body TEXT NOT NULL,
        spent INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (tx_hash, idx)
    );
    CREATE TABLE IF NOT EXISTS transactions (
        hash BLOB PRIMARY KEY,
        seq INTEGER NOT NULL,
        status INTEGER NOT NULL,
        body TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS transactions_pending ON transactions (status, seq);
    CREATE TABLE IF NOT EXISTS supply (
        asset BLOB PRIMARY KEY,
        issued INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS blocks (
        hash BLOB PRIMARY KEY,
        seq INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        body TEXT NOT NULL
    );
";

const STATUS_PENDING: i64 = 0;
const STATUS_CONFIRMED: i64 = 1;

fn status_code(status: TxStatus) -> i64 {
    match status {
        TxStatus::Pending => STATUS_PENDING,
        TxStatus::Confirmed => STATUS_CONFIRMED,
    }
}

fn status_from_code(code: i64) -> Result<TxStatus, StoreError> {
    match code {
        STATUS_PENDING => Ok(TxStatus::Pending),
        STATUS_CONFIRMED => Ok(TxStatus::Confirmed),
        other => Err(StoreError::Database(format!("unknown transaction status {}", other))),
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`; `":memory:"` gives
    /// a private in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!("Opened SQLite store at {}", path);
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

fn output_state_in(conn: &Connection, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT body, spent FROM outputs WHERE tx_hash = ?1 AND idx = ?2",
            params![outpoint.hash.to_vec(), outpoint.index],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        None => Ok(OutputState::Unknown),
        Some((_, spent)) if spent != 0 => Ok(OutputState::Spent),
        Some((body, _)) => Ok(OutputState::Unspent(serde_json::from_str::<TxOutput>(&body)?)),
    }
}

fn tx_status_in(conn: &Connection, hash: &Hash) -> Result<Option<TxStatus>, StoreError> {
    let code: Option<i64> = conn
        .query_row(
            "SELECT status FROM transactions WHERE hash = ?1",
            params![hash.to_vec()],
            |row| row.get(0),
        )
        .optional()?;
    code.map(status_from_code).transpose()
}

fn supply_in(conn: &Connection, asset: &AssetId) -> Result<Amount, StoreError> {
    let issued: Option<i64> = conn
        .query_row(
            "SELECT issued FROM supply WHERE asset = ?1",
            params![asset.as_bytes().to_vec()],
            |row| row.get(0),
        )
        .optional()?;
    // amounts are stored as the bit pattern of the u64
    Ok(issued.map(|v| v as u64).unwrap_or(0))
}

/// Applies one transaction inside an open SQL transaction. The caller
/// commits or drops (rolling back) as a unit.
fn apply_tx_in(conn: &Connection, tx: &Tx, issued: &IssuedAmounts, status: TxStatus) -> Result<(), StoreError> {
    let hash = tx.hash();
    if tx_status_in(conn, &hash)?.is_some() {
        return Err(StoreError::AlreadyKnown(hash));
    }

    for previous in tx.spends() {
        // compare-and-set on the unspent flag
        let changed = conn.execute(
            "UPDATE outputs SET spent = 1 WHERE tx_hash = ?1 AND idx = ?2 AND spent = 0",
            params![previous.hash.to_vec(), previous.index],
        )?;
        if changed == 0 {
            return Err(match output_state_in(conn, previous)? {
                OutputState::Unknown => StoreError::MissingOutput(*previous),
                _ => StoreError::OutputSpent(*previous),
            });
        }
    }

    for (outpoint, output) in tx.outpoints() {
        conn.execute(
            "INSERT INTO outputs (tx_hash, idx, body, spent) VALUES (?1, ?2, ?3, 0)",
            params![outpoint.hash.to_vec(), outpoint.index, serde_json::to_string(output)?],
        )?;
    }

    for (asset, amount) in issued {
        let total = supply_in(conn, asset)?
            .checked_add(*amount)
            .ok_or(StoreError::SupplyOverflow(*asset))?;
        conn.execute(
            "INSERT OR REPLACE INTO supply (asset, issued) VALUES (?1, ?2)",
            params![asset.as_bytes().to_vec(), total as i64],
        )?;
    }

    let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM transactions", [], |row| row.get(0))?;
    conn.execute(
        "INSERT INTO transactions (hash, seq, status, body) VALUES (?1, ?2, ?3, ?4)",
        params![hash.to_vec(), seq, status_code(status), serde_json::to_string(tx)?],
    )?;
    Ok(())
}

impl StateView for SqliteStore {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
        output_state_in(&self.conn.lock(), outpoint)
    }
}

impl Store for SqliteStore {
    fn tx_status(&self, hash: &Hash) -> Result<Option<TxStatus>, StoreError> {
        tx_status_in(&self.conn.lock(), hash)
    }

    fn apply_tx(&self, tx: &Tx, issued: &IssuedAmounts) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let sql_tx = conn.transaction()?;
        apply_tx_in(&sql_tx, tx, issued, TxStatus::Pending)?;
        sql_tx.commit()?;
        Ok(())
    }

    fn apply_block(&self, block: &Block, issued: &HashMap<Hash, IssuedAmounts>) -> Result<bool, StoreError> {
        let block_hash = block.hash();
        let mut conn = self.conn.lock();
        let sql_tx = conn.transaction()?;

        let recorded: Option<i64> = sql_tx
            .query_row(
                "SELECT seq FROM blocks WHERE hash = ?1",
                params![block_hash.to_vec()],
                |row| row.get(0),
            )
            .optional()?;
        if recorded.is_some() {
            return Ok(false);
        }

        for tx in &block.transactions {
            let hash = tx.hash();
            match tx_status_in(&sql_tx, &hash)? {
                Some(TxStatus::Confirmed) => {}
                Some(TxStatus::Pending) => {
                    sql_tx.execute(
                        "UPDATE transactions SET status = ?1 WHERE hash = ?2",
                        params![STATUS_CONFIRMED, hash.to_vec()],
                    )?;
                }
                None => {
                    let amounts = issued.get(&hash).ok_or_else(|| {
                        StoreError::Inconsistent(format!(
                            "block transaction {} is unknown and was not validated",
                            tx.hash_str()
                        ))
                    })?;
                    apply_tx_in(&sql_tx, tx, amounts, TxStatus::Confirmed)?;
                }
            }
        }

        let seq: i64 = sql_tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM blocks", [], |row| row.get(0))?;
        sql_tx.execute(
            "INSERT INTO blocks (hash, seq, timestamp, body) VALUES (?1, ?2, ?3, ?4)",
            params![block_hash.to_vec(), seq, block.timestamp as i64, serde_json::to_string(block)?],
        )?;
        sql_tx.commit()?;
        Ok(true)
    }

    fn pending_txs(&self) -> Result<Vec<Tx>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT body FROM transactions WHERE status = ?1 ORDER BY seq ASC")?;
        let rows = stmt.query_map(params![STATUS_PENDING], |row| row.get::<_, String>(0))?;

        let mut txs = Vec::new();
        for body in rows {
            txs.push(serde_json::from_str(&body?)?);
        }
        Ok(txs)
    }

    fn issued_supply(&self, asset: &AssetId) -> Result<Amount, StoreError> {
        supply_in(&self.conn.lock(), asset)
    }

    fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row("SELECT body FROM blocks ORDER BY seq DESC LIMIT 1", [], |row| row.get(0))
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }
}
