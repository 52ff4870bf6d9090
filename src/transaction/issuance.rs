//! Issuance accounting: how much of each asset a transaction mints.

use crate::transaction::types::{Amount, AssetId, Tx};
use crate::transaction::validation::SpentOutputs;
use std::collections::BTreeMap;

/// Newly minted amount per asset for one transaction.
pub type IssuedAmounts = BTreeMap<AssetId, Amount>;

impl Tx {
    /// Amount minted per asset, given the outputs this transaction consumes.
    ///
    /// Transactions without an issuance input mint nothing and yield an empty
    /// map. Otherwise every asset among the outputs gets an entry equal to its
    /// output total minus its spent-input total, so an asset that is merely
    /// transferred alongside an issuance shows up with zero. Expects a
    /// validated transaction; a deficit saturates at zero.
    pub fn issued_amounts(&self, spent: &SpentOutputs) -> IssuedAmounts {
        let mut issued = IssuedAmounts::new();
        if !self.has_issuance() {
            return issued;
        }

        let mut spent_totals: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for output in spent.iter() {
            let total = spent_totals.entry(output.asset_id()).or_insert(0);
            *total = total.saturating_add(output.amount());
        }

        for output in self.outputs() {
            let total = issued.entry(output.asset_id()).or_insert(0);
            *total = total.saturating_add(output.amount());
        }
        for (asset, minted) in issued.iter_mut() {
            let backed = spent_totals.get(asset).copied().unwrap_or(0);
            *minted = minted.saturating_sub(backed);
        }
        issued
    }
}
