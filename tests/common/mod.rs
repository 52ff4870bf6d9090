//! Shared builders for the integration tests.
#![allow(dead_code)]

use fedchain::blockchain::Block;
use fedchain::crypto::{Hash, KeyPair};
use fedchain::persistence::{MemStore, OutputState, StateView, Store, StoreError, TxStatus};
use fedchain::script::Script;
use fedchain::transaction::{
    Amount, AssetAmount, AssetId, IssuedAmounts, Outpoint, Tx, TxData, TxInput, TxOutput,
};
use parking_lot::Mutex;
use std::collections::HashMap;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub struct Asset {
    pub keypair: KeyPair,
    pub program: Script,
    pub id: AssetId,
}

impl Asset {
    pub fn new() -> Self {
        let keypair = KeyPair::generate();
        let program = Script::pay_to(&keypair);
        let id = AssetId::from_program(&program);
        Asset { keypair, program, id }
    }
}

pub struct Wallet {
    pub keypair: KeyPair,
    pub script: Script,
}

impl Wallet {
    pub fn new() -> Self {
        let keypair = KeyPair::generate();
        let script = Script::pay_to(&keypair);
        Wallet { keypair, script }
    }
}

/// Spend inputs signed by `owner`, followed by issuance inputs for `mint`.
pub fn build_tx(
    spends: &[(&Tx, u32)],
    owner: Option<&Wallet>,
    mint: &[&Asset],
    outputs: Vec<TxOutput>,
) -> Tx {
    let mut inputs: Vec<TxInput> = spends
        .iter()
        .map(|(prev, index)| TxInput::spend(prev.outpoint(*index)))
        .collect();
    inputs.extend(mint.iter().map(|asset| TxInput::issuance(asset.program.clone())));

    let mut data = TxData::new(inputs, outputs);
    for (i, (prev, index)) in spends.iter().enumerate() {
        let owner = owner.expect("spends need an owner");
        let amount = prev.outputs()[*index as usize].asset_amount;
        data.sign_input(i, &owner.keypair, &amount).unwrap();
    }
    for (j, asset) in mint.iter().enumerate() {
        data.sign_input(spends.len() + j, &asset.keypair, &AssetAmount::default())
            .unwrap();
    }
    Tx::new(data)
}

pub fn issue(asset: &Asset, to: &Wallet, amount: Amount) -> Tx {
    build_tx(&[], None, &[asset], vec![TxOutput::new(asset.id, amount, to.script.clone())])
}

pub fn transfer(prev: &Tx, index: u32, from: &Wallet, to: &Wallet) -> Tx {
    let spent = &prev.outputs()[index as usize];
    build_tx(
        &[(prev, index)],
        Some(from),
        &[],
        vec![TxOutput::new(spent.asset_id(), spent.amount(), to.script.clone())],
    )
}

/// Wraps a store and remembers every issued-amounts map handed to it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemStore,
    pub issued: Mutex<HashMap<Hash, IssuedAmounts>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued_for(&self, hash: &Hash) -> Option<IssuedAmounts> {
        self.issued.lock().get(hash).cloned()
    }
}

impl StateView for RecordingStore {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
        self.inner.output_state(outpoint)
    }
}

impl Store for RecordingStore {
    fn tx_status(&self, hash: &Hash) -> Result<Option<TxStatus>, StoreError> {
        self.inner.tx_status(hash)
    }

    fn apply_tx(&self, tx: &Tx, issued: &IssuedAmounts) -> Result<(), StoreError> {
        self.inner.apply_tx(tx, issued)?;
        self.issued.lock().insert(tx.hash(), issued.clone());
        Ok(())
    }

    fn apply_block(&self, block: &Block, issued: &HashMap<Hash, IssuedAmounts>) -> Result<bool, StoreError> {
        let landed = self.inner.apply_block(block, issued)?;
        if landed {
            self.issued
                .lock()
                .extend(issued.iter().map(|(hash, amounts)| (*hash, amounts.clone())));
        }
        Ok(landed)
    }

    fn pending_txs(&self) -> Result<Vec<Tx>, StoreError> {
        self.inner.pending_txs()
    }

    fn issued_supply(&self, asset: &AssetId) -> Result<Amount, StoreError> {
        self.inner.issued_supply(asset)
    }

    fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        self.inner.latest_block()
    }
}
