//! Configuration management for fedchain

use crate::crypto;
use crate::error::{ChainError, Result};
use crate::script::Script;
use crate::transaction::MAX_TRANSACTION_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Hex-encoded public keys of the federation members that sign blocks.
    /// Empty means blocks are accepted without a signature.
    #[serde(default)]
    pub block_signers: Vec<String>,
    #[serde(default = "default_block_quorum")]
    pub block_quorum: u8,
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: usize,
    #[serde(default = "default_max_block_txs")]
    pub max_block_txs: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block_signers: Vec::new(),
            block_quorum: default_block_quorum(),
            max_tx_size: default_max_tx_size(),
            max_block_txs: default_max_block_txs(),
        }
    }
}

impl ChainConfig {
    /// The federation's block-signing program, `None` when no signers are
    /// configured.
    pub fn block_program(&self) -> Result<Option<Script>> {
        if self.block_signers.is_empty() {
            return Ok(None);
        }

        let mut public_keys = Vec::with_capacity(self.block_signers.len());
        for signer in &self.block_signers {
            let key = crypto::public_key_from_hex(signer)
                .map_err(|e| ChainError::Config(format!("invalid block signer {}: {}", signer, e)))?;
            if public_keys.contains(&key) {
                return Err(ChainError::Config(format!("duplicate block signer {}", signer)));
            }
            public_keys.push(key);
        }

        if self.block_quorum == 0 || usize::from(self.block_quorum) > public_keys.len() {
            return Err(ChainError::Config(format!(
                "chain.block_quorum must be between 1 and {}, got {}",
                public_keys.len(),
                self.block_quorum
            )));
        }

        Ok(Some(Script::MultiSig {
            threshold: self.block_quorum,
            public_keys,
        }))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tx_size == 0 {
            return Err(ChainError::Config("chain.max_tx_size must be positive".to_string()));
        }
        if self.max_block_txs == 0 {
            return Err(ChainError::Config("chain.max_block_txs must be positive".to_string()));
        }
        self.block_program()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_block_quorum() -> u8 {
    1
}

fn default_max_tx_size() -> usize {
    MAX_TRANSACTION_SIZE
}

fn default_max_block_txs() -> usize {
    10_000
}

fn default_db_path() -> String {
    "./data/fedchain.db".to_string()
}

impl Config {
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chain.validate()?;
        if self.database.backend == StoreBackend::Sqlite && self.database.path.is_empty() {
            return Err(ChainError::Config(
                "database.path must be set for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads `path`, falling back to defaults when the file is absent or empty.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Config::from_toml_str(&config_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.chain.max_tx_size, MAX_TRANSACTION_SIZE);
        assert_eq!(config.chain.max_block_txs, 10_000);
        assert!(config.chain.block_program().unwrap().is_none());
    }

    #[test]
    fn test_full_file() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            format!(
                r#"
[chain]
block_signers = ["{}", "{}"]
block_quorum = 2
max_block_txs = 50

[database]
backend = "sqlite"
path = "/tmp/ledger.db"
"#,
                hex::encode(a.public_key_bytes()),
                hex::encode(b.public_key_bytes())
            ),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.database.path, "/tmp/ledger.db");
        assert_eq!(config.chain.max_block_txs, 50);
        assert_eq!(config.chain.max_tx_size, MAX_TRANSACTION_SIZE);
        match config.chain.block_program().unwrap() {
            Some(Script::MultiSig {
                threshold,
                public_keys,
            }) => {
                assert_eq!(threshold, 2);
                assert_eq!(public_keys.len(), 2);
            }
            other => panic!("unexpected program {:?}", other),
        }
    }

    #[test]
    fn test_quorum_out_of_range() {
        let signer = hex::encode(KeyPair::generate().public_key_bytes());
        let err = Config::from_toml_str(&format!(
            "[chain]\nblock_signers = [\"{}\"]\nblock_quorum = 2\n",
            signer
        ))
        .unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn test_signers_must_be_public_keys() {
        let valid = hex::encode(KeyPair::generate().public_key_bytes());
        for bad in ["abcd".to_string(), hex::encode([0x05u8; 33])] {
            let err = Config::from_toml_str(&format!(
                "[chain]\nblock_signers = [\"{}\", \"{}\"]\nblock_quorum = 2\n",
                bad, valid
            ))
            .unwrap_err();
            assert!(matches!(err, ChainError::Config(_)), "accepted signer {}", bad);
        }

        let chain = ChainConfig {
            block_signers: vec!["abcd".to_string(), valid],
            block_quorum: 2,
            ..ChainConfig::default()
        };
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_bad_signer_hex_and_unknown_backend() {
        assert!(Config::from_toml_str("[chain]\nblock_signers = [\"zz\"]\n").is_err());
        assert!(Config::from_toml_str("[database]\nbackend = \"rocksdb\"\n").is_err());
    }
}
