/// Transaction types for fedchain
use crate::crypto::{sha256, Hash, KeyPair};
use crate::error::RejectReason;
use crate::script::{write_var_bytes, Script, Witness};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

pub const CURRENT_TX_VERSION: u32 = 1;

pub type Amount = u64;

/// Identifier of an asset, derived from its issuance program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Hash);

impl AssetId {
    pub fn from_program(program: &Script) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"fedchain/asset");
        hasher.update(program.to_bytes());
        AssetId(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: Amount,
}

/// Pointer to one output of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    pub hash: Hash,
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Outpoint { hash, index }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.hash), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxInput {
    /// Consumes an existing unspent output; the witness must satisfy its lock.
    Spend { previous: Outpoint, witness: Witness },
    /// Mints units of the asset named by `program`; the witness must satisfy the program.
    Issuance { program: Script, witness: Witness },
}

impl TxInput {
    pub fn spend(previous: Outpoint) -> Self {
        TxInput::Spend {
            previous,
            witness: Witness::new(),
        }
    }

    pub fn issuance(program: Script) -> Self {
        TxInput::Issuance {
            program,
            witness: Witness::new(),
        }
    }

    pub fn witness(&self) -> &Witness {
        match self {
            TxInput::Spend { witness, .. } | TxInput::Issuance { witness, .. } => witness,
        }
    }

    fn witness_mut(&mut self) -> &mut Witness {
        match self {
            TxInput::Spend { witness, .. } | TxInput::Issuance { witness, .. } => witness,
        }
    }

    pub fn previous(&self) -> Option<&Outpoint> {
        match self {
            TxInput::Spend { previous, .. } => Some(previous),
            TxInput::Issuance { .. } => None,
        }
    }

    pub fn is_issuance(&self) -> bool {
        matches!(self, TxInput::Issuance { .. })
    }

    /// The asset minted by an issuance input.
    pub fn issued_asset(&self) -> Option<AssetId> {
        match self {
            TxInput::Issuance { program, .. } => Some(AssetId::from_program(program)),
            TxInput::Spend { .. } => None,
        }
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        match self {
            TxInput::Spend { previous, .. } => {
                out.push(0);
                out.extend_from_slice(&previous.hash);
                out.extend_from_slice(&previous.index.to_le_bytes());
            }
            TxInput::Issuance { program, .. } => {
                out.push(1);
                write_var_bytes(out, &program.to_bytes());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub asset_amount: AssetAmount,
    pub script: Script,
}

impl TxOutput {
    pub fn new(asset_id: AssetId, amount: Amount, script: Script) -> Self {
        TxOutput {
            asset_amount: AssetAmount { asset_id, amount },
            script,
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_amount.asset_id
    }

    pub fn amount(&self) -> Amount {
        self.asset_amount.amount
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.asset_amount.asset_id.as_bytes());
        out.extend_from_slice(&self.asset_amount.amount.to_le_bytes());
        write_var_bytes(out, &self.script.to_bytes());
    }
}

/// The mutable body of a transaction, used while building and signing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxData {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl TxData {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        TxData {
            version: CURRENT_TX_VERSION,
            inputs,
            outputs,
        }
    }

    /// Payload signed by input `index`. Witnesses are excluded and the
    /// consumed output's asset and amount are bound in, so a signature can
    /// neither be lifted onto another output nor reused by another input.
    /// Issuance inputs pass `AssetAmount::default()`.
    pub fn signable_message(&self, index: usize, asset_amount: &AssetAmount) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice(b"fedchain/sighash");
        self.write_body(&mut message, false);
        message.extend_from_slice(&(index as u32).to_le_bytes());
        message.extend_from_slice(asset_amount.asset_id.as_bytes());
        message.extend_from_slice(&asset_amount.amount.to_le_bytes());
        message
    }

    /// Adds a signature by `keypair` to input `index`.
    pub fn sign_input(
        &mut self,
        index: usize,
        keypair: &KeyPair,
        asset_amount: &AssetAmount,
    ) -> Result<(), RejectReason> {
        if index >= self.inputs.len() {
            return Err(RejectReason::Malformed(format!(
                "cannot sign input {} of {}",
                index,
                self.inputs.len()
            )));
        }
        let message = self.signable_message(index, asset_amount);
        self.inputs[index].witness_mut().sign(keypair, &message);
        Ok(())
    }

    fn write_body(&self, out: &mut Vec<u8>, with_witnesses: bool) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            input.write_body(out);
            if with_witnesses {
                write_var_bytes(out, &input.witness().to_bytes());
            }
        }
        out.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            output.write(out);
        }
    }

    pub fn hash(&self) -> Hash {
        let mut body = Vec::new();
        self.write_body(&mut body, true);
        sha256(&body)
    }
}

/// An immutable, content-addressed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TxData", into = "TxData")]
pub struct Tx {
    hash: Hash,
    data: TxData,
}

impl Tx {
    pub fn new(data: TxData) -> Self {
        Tx {
            hash: data.hash(),
            data,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn data(&self) -> &TxData {
        &self.data
    }

    pub fn version(&self) -> u32 {
        self.data.version
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.data.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.data.outputs
    }

    pub fn outpoint(&self, index: u32) -> Outpoint {
        Outpoint::new(self.hash, index)
    }

    /// Outputs paired with the outpoints that will reference them.
    pub fn outpoints(&self) -> impl Iterator<Item = (Outpoint, &TxOutput)> + '_ {
        self.data
            .outputs
            .iter()
            .enumerate()
            .map(move |(i, output)| (Outpoint::new(self.hash, i as u32), output))
    }

    /// Outpoints this transaction consumes.
    pub fn spends(&self) -> impl Iterator<Item = &Outpoint> + '_ {
        self.data.inputs.iter().filter_map(TxInput::previous)
    }

    pub fn has_issuance(&self) -> bool {
        self.data.inputs.iter().any(TxInput::is_issuance)
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self, max: usize) -> Result<(), RejectReason> {
        let size = bincode::serialized_size(&self.data)
            .map_err(|e| RejectReason::Malformed(format!("serialization failed: {}", e)))? as usize;
        if size > max {
            return Err(RejectReason::TooLarge { size, max });
        }
        Ok(())
    }
}

impl From<TxData> for Tx {
    fn from(data: TxData) -> Self {
        Tx::new(data)
    }
}

impl From<Tx> for TxData {
    fn from(tx: Tx) -> Self {
        tx.data
    }
}
