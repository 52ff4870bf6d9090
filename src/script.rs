//! Authorization programs and the witnesses that satisfy them.
//!
//! A [`Script`] guards every output (its lock), every asset (its issuance
//! program) and, optionally, every block (the federation policy). A
//! [`Witness`] carries the public keys and signatures presented against it.
//! Only verification lives here; producing signatures is the signer's job.

use crate::crypto::{self, Address, CryptoError, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const TAG_TRUE: u8 = 0x51;
const TAG_PUBKEY_HASH: u8 = 0x76;
const TAG_MULTISIG: u8 = 0xae;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    /// Satisfied by any witness.
    True,
    /// Satisfied by a signature from the key whose SHA-256 is this address.
    PubKeyHash(Address),
    /// Satisfied by signatures from at least `threshold` distinct listed keys.
    MultiSig {
        threshold: u8,
        public_keys: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("witness carries no signature")]
    MissingSignature,

    #[error("no witness key matches the required address")]
    KeyMismatch,

    #[error("{0}")]
    Crypto(#[from] CryptoError),

    #[error("only {have} of {need} required signatures are valid")]
    QuorumNotMet { have: usize, need: usize },

    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("witness entry {0} is not used by the program")]
    UnusedWitnessEntry(usize),
}

/// One public key and its compact signature over the signing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub signatures: Vec<SignatureEntry>,
}

impl Witness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a signature by `keypair` over `message`.
    pub fn sign(&mut self, keypair: &KeyPair, message: &[u8]) {
        self.signatures.push(SignatureEntry {
            public_key: keypair.public_key_bytes().to_vec(),
            signature: keypair.sign(message).to_vec(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Canonical byte encoding, part of the owning transaction's hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.signatures.len() as u32).to_le_bytes());
        for entry in &self.signatures {
            write_var_bytes(&mut out, &entry.public_key);
            write_var_bytes(&mut out, &entry.signature);
        }
        out
    }
}

impl Script {
    /// Single-key lock for `keypair`.
    pub fn pay_to(keypair: &KeyPair) -> Self {
        Script::PubKeyHash(keypair.address())
    }

    /// Canonical byte encoding. Asset identities are derived from it, so it
    /// must never change for an existing program.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Script::True => out.push(TAG_TRUE),
            Script::PubKeyHash(address) => {
                out.push(TAG_PUBKEY_HASH);
                out.extend_from_slice(address);
            }
            Script::MultiSig {
                threshold,
                public_keys,
            } => {
                out.push(TAG_MULTISIG);
                out.push(*threshold);
                out.extend_from_slice(&(public_keys.len() as u32).to_le_bytes());
                for key in public_keys {
                    write_var_bytes(&mut out, key);
                }
            }
        }
        out
    }

    /// Checks that `witness` satisfies this program for `message`. Every
    /// witness entry must be consumed by the program.
    pub fn verify(&self, witness: &Witness, message: &[u8]) -> Result<(), ScriptError> {
        match self {
            Script::True => match witness.signatures.len() {
                0 => Ok(()),
                _ => Err(ScriptError::UnusedWitnessEntry(0)),
            },
            Script::PubKeyHash(address) => {
                let entry = witness.signatures.first().ok_or(ScriptError::MissingSignature)?;
                if witness.signatures.len() > 1 {
                    return Err(ScriptError::UnusedWitnessEntry(1));
                }
                if crypto::address_of(&entry.public_key) != *address {
                    return Err(ScriptError::KeyMismatch);
                }
                crypto::verify_signature(&entry.public_key, message, &entry.signature)?;
                Ok(())
            }
            Script::MultiSig {
                threshold,
                public_keys,
            } => {
                let need = *threshold as usize;
                if need == 0 || need > public_keys.len() {
                    return Err(ScriptError::InvalidProgram(format!(
                        "threshold {} over {} keys",
                        threshold,
                        public_keys.len()
                    )));
                }
                if witness.is_empty() {
                    return Err(ScriptError::MissingSignature);
                }

                // each entry must be a distinct listed key with a valid signature
                let mut signers: HashSet<&[u8]> = HashSet::new();
                for (i, entry) in witness.signatures.iter().enumerate() {
                    let listed = public_keys.iter().any(|key| key == &entry.public_key);
                    if !listed || !signers.insert(entry.public_key.as_slice()) {
                        return Err(ScriptError::UnusedWitnessEntry(i));
                    }
                    crypto::verify_signature(&entry.public_key, message, &entry.signature)?;
                }

                if signers.len() < need {
                    return Err(ScriptError::QuorumNotMet {
                        have: signers.len(),
                        need,
                    });
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}
