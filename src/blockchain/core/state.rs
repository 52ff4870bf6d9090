use crate::persistence::{OutputState, StateView, StoreError};
use crate::transaction::{Outpoint, Tx, TxOutput};
use std::collections::{HashMap, HashSet};

/// Store state plus the effects of the block transactions validated so far,
/// so a block may spend outputs created earlier in the same block.
pub struct BlockOverlay<'a, V: StateView + ?Sized> {
    base: &'a V,
    created: HashMap<Outpoint, TxOutput>,
    spent: HashSet<Outpoint>,
}

impl<'a, V: StateView + ?Sized> BlockOverlay<'a, V> {
    pub fn new(base: &'a V) -> Self {
        BlockOverlay {
            base,
            created: HashMap::new(),
            spent: HashSet::new(),
        }
    }

    pub fn apply(&mut self, tx: &Tx) {
        for previous in tx.spends() {
            self.created.remove(previous);
            self.spent.insert(*previous);
        }
        for (outpoint, output) in tx.outpoints() {
            self.created.insert(outpoint, output.clone());
        }
    }
}

impl<V: StateView + ?Sized> StateView for BlockOverlay<'_, V> {
    fn output_state(&self, outpoint: &Outpoint) -> Result<OutputState, StoreError> {
        if self.spent.contains(outpoint) {
            return Ok(OutputState::Spent);
        }
        if let Some(output) = self.created.get(outpoint) {
            return Ok(OutputState::Unspent(output.clone()));
        }
        self.base.output_state(outpoint)
    }
}
