//! Builders shared by the unit tests.

use crate::crypto::KeyPair;
use crate::persistence::Store;
use crate::script::Script;
use crate::transaction::{AssetAmount, AssetId, IssuedAmounts, Tx, TxData, TxInput, TxOutput};

/// An asset whose issuance program is a single-key lock.
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

/// An output owner.
pub struct Dest {
    pub keypair: KeyPair,
    pub script: Script,
}

impl Dest {
    pub fn new() -> Self {
        let keypair = KeyPair::generate();
        let script = Script::pay_to(&keypair);
        Dest { keypair, script }
    }
}

/// Mints `amount` of `asset` to `dest` with one issuance input.
pub fn issue(asset: &Asset, dest: &Dest, amount: u64) -> Tx {
    let mut data = TxData::new(
        vec![TxInput::issuance(asset.program.clone())],
        vec![TxOutput::new(asset.id, amount, dest.script.clone())],
    );
    data.sign_input(0, &asset.keypair, &AssetAmount::default())
        .unwrap();
    Tx::new(data)
}

/// Moves output `index` of `prev` in full from `from` to `to`.
pub fn transfer(prev: &Tx, index: u32, from: &Dest, to: &Dest) -> Tx {
    let spent = prev.outputs()[index as usize].clone();
    let mut data = TxData::new(
        vec![TxInput::spend(prev.outpoint(index))],
        vec![TxOutput::new(spent.asset_id(), spent.amount(), to.script.clone())],
    );
    data.sign_input(0, &from.keypair, &spent.asset_amount).unwrap();
    Tx::new(data)
}

/// Applies `tx` to `store` without validating it.
pub fn seed<S: Store + ?Sized>(store: &S, tx: &Tx) {
    store.apply_tx(tx, &IssuedAmounts::new()).unwrap();
}
