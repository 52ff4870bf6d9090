/// Validation logic for transactions separated from type definitions
use crate::error::{RejectReason, Result};
use crate::persistence::{OutputState, StateView};
use crate::transaction::types::{AssetAmount, AssetId, Tx, TxInput, TxOutput, CURRENT_TX_VERSION};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Outputs consumed by a validated transaction, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpentOutputs(pub Vec<TxOutput>);

impl SpentOutputs {
    pub fn iter(&self) -> impl Iterator<Item = &TxOutput> {
        self.0.iter()
    }
}

impl Tx {
    /// Stateless checks: version, non-empty inputs and outputs, no outpoint
    /// spent twice within the transaction.
    pub fn check_structure(&self) -> std::result::Result<(), RejectReason> {
        if self.version() != CURRENT_TX_VERSION {
            return Err(RejectReason::Malformed(format!(
                "unsupported version {}",
                self.version()
            )));
        }
        if self.inputs().is_empty() {
            return Err(RejectReason::Malformed("transaction has no inputs".to_string()));
        }
        if self.outputs().is_empty() {
            return Err(RejectReason::Malformed("transaction has no outputs".to_string()));
        }

        let mut seen = HashSet::new();
        for previous in self.spends() {
            if !seen.insert(*previous) {
                return Err(RejectReason::Malformed(format!(
                    "output {} is spent twice by the same transaction",
                    previous
                )));
            }
        }
        Ok(())
    }

    /// Full validation against `view`: structure, authorization of every
    /// input and per-asset balance. Store failures during lookups come back
    /// as `ChainError::Store`, everything else as `ChainError::TxRejected`.
    pub fn validate<V: StateView + ?Sized>(&self, view: &V) -> Result<SpentOutputs> {
        self.check_structure()?;

        let mut spent = Vec::new();

        for (index, input) in self.inputs().iter().enumerate() {
            match input {
                TxInput::Spend { previous, witness } => {
                    let output = match view.output_state(previous)? {
                        OutputState::Unspent(output) => output,
                        OutputState::Spent => return Err(RejectReason::DoubleSpend(*previous).into()),
                        OutputState::Unknown => return Err(RejectReason::MissingOutput(*previous).into()),
                    };
                    let message = self.data().signable_message(index, &output.asset_amount);
                    output
                        .script
                        .verify(witness, &message)
                        .map_err(|reason| RejectReason::BadSignature { input: index, reason })?;
                    spent.push(output);
                }
                TxInput::Issuance { program, witness } => {
                    let message = self.data().signable_message(index, &AssetAmount::default());
                    program
                        .verify(witness, &message)
                        .map_err(|reason| RejectReason::BadSignature { input: index, reason })?;
                }
            }
        }
        let issued_assets: BTreeSet<AssetId> = self.inputs().iter().filter_map(TxInput::issued_asset).collect();

        let spent = SpentOutputs(spent);
        check_balance(self, &spent, &issued_assets)?;
        Ok(spent)
    }
}

/// Per-asset totals of spend inputs and outputs.
pub(crate) fn asset_totals(
    tx: &Tx,
    spent: &SpentOutputs,
) -> std::result::Result<(BTreeMap<AssetId, u64>, BTreeMap<AssetId, u64>), RejectReason> {
    fn add(totals: &mut BTreeMap<AssetId, u64>, asset: AssetId, amount: u64) -> std::result::Result<(), RejectReason> {
        let total = totals.entry(asset).or_insert(0);
        *total = total
            .checked_add(amount)
            .ok_or_else(|| RejectReason::Malformed(format!("amount overflow for asset {}", asset)))?;
        Ok(())
    }

    let mut inputs = BTreeMap::new();
    for output in spent.iter() {
        add(&mut inputs, output.asset_id(), output.amount())?;
    }
    let mut outputs = BTreeMap::new();
    for output in tx.outputs() {
        add(&mut outputs, output.asset_id(), output.amount())?;
    }
    Ok((inputs, outputs))
}

/// Without an issuance input an asset must balance exactly; with one, the
/// outputs may exceed the spent amount and the excess is newly minted.
fn check_balance(
    tx: &Tx,
    spent: &SpentOutputs,
    issued_assets: &BTreeSet<AssetId>,
) -> std::result::Result<(), RejectReason> {
    let (inputs, outputs) = asset_totals(tx, spent)?;

    let assets: BTreeSet<AssetId> = inputs.keys().chain(outputs.keys()).copied().collect();
    for asset in assets {
        let input_total = inputs.get(&asset).copied().unwrap_or(0);
        let output_total = outputs.get(&asset).copied().unwrap_or(0);
        let balanced = if issued_assets.contains(&asset) {
            output_total >= input_total
        } else {
            output_total == input_total
        };
        if !balanced {
            return Err(RejectReason::Unbalanced {
                asset,
                inputs: input_total,
                outputs: output_total,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::error::ChainError;
    use crate::persistence::MemStore;
    use crate::script::{Script, ScriptError};
    use crate::testutil::{issue, seed, transfer, Asset, Dest};
    use crate::transaction::{Outpoint, TxData};

    fn rejected(result: Result<SpentOutputs>) -> RejectReason {
        match result {
            Err(ChainError::TxRejected(reason)) => reason,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_issuance_validates_against_empty_state() {
        let store = MemStore::new();
        let tx = issue(&Asset::new(), &Dest::new(), 10);
        let spent = tx.validate(&store).unwrap();
        assert!(spent.0.is_empty());
    }

    #[test]
    fn test_structure_checks() {
        let store = MemStore::new();
        let asset = Asset::new();

        let no_inputs = Tx::new(TxData::new(vec![], vec![TxOutput::new(asset.id, 1, Script::True)]));
        assert!(matches!(rejected(no_inputs.validate(&store)), RejectReason::Malformed(_)));

        let no_outputs = Tx::new(TxData::new(vec![TxInput::issuance(asset.program.clone())], vec![]));
        assert!(matches!(rejected(no_outputs.validate(&store)), RejectReason::Malformed(_)));

        let mut data = TxData::new(
            vec![TxInput::issuance(asset.program.clone())],
            vec![TxOutput::new(asset.id, 1, Script::True)],
        );
        data.version = 7;
        assert!(matches!(rejected(Tx::new(data).validate(&store)), RejectReason::Malformed(_)));

        let prev = Outpoint::new([3u8; 32], 0);
        let twice = Tx::new(TxData::new(
            vec![TxInput::spend(prev), TxInput::spend(prev)],
            vec![TxOutput::new(asset.id, 1, Script::True)],
        ));
        assert!(matches!(rejected(twice.validate(&store)), RejectReason::Malformed(_)));
    }

    #[test]
    fn test_missing_and_spent_outputs() {
        let store = MemStore::new();
        let asset = Asset::new();
        let owner = Dest::new();
        let issued = issue(&asset, &owner, 4);

        let orphan = transfer(&issued, 0, &owner, &Dest::new());
        assert_eq!(
            rejected(orphan.validate(&store)),
            RejectReason::MissingOutput(issued.outpoint(0))
        );

        seed(&store, &issued);
        let first = transfer(&issued, 0, &owner, &Dest::new());
        assert!(first.validate(&store).is_ok());
        seed(&store, &first);

        let second = transfer(&issued, 0, &owner, &Dest::new());
        assert_eq!(
            rejected(second.validate(&store)),
            RejectReason::DoubleSpend(issued.outpoint(0))
        );
    }

    #[test]
    fn test_spend_requires_owner_signature() {
        let store = MemStore::new();
        let asset = Asset::new();
        let owner = Dest::new();
        let thief = Dest::new();
        let issued = issue(&asset, &owner, 4);
        seed(&store, &issued);

        let stolen = transfer(&issued, 0, &thief, &thief);
        assert!(matches!(
            rejected(stolen.validate(&store)),
            RejectReason::BadSignature {
                input: 0,
                reason: ScriptError::KeyMismatch
            }
        ));
    }

    #[test]
    fn test_padded_witness_is_rejected() {
        let store = MemStore::new();
        let asset = Asset::new();
        let owner = Dest::new();
        let issued = issue(&asset, &owner, 4);
        seed(&store, &issued);

        let honest = transfer(&issued, 0, &owner, &Dest::new());
        let mut data = honest.data().clone();
        data.sign_input(0, &KeyPair::generate(), &issued.outputs()[0].asset_amount)
            .unwrap();
        let padded = Tx::new(data);
        assert_ne!(padded.hash(), honest.hash());
        assert_eq!(
            rejected(padded.validate(&store)),
            RejectReason::BadSignature {
                input: 0,
                reason: ScriptError::UnusedWitnessEntry(1)
            }
        );
        assert!(honest.validate(&store).is_ok());
    }

    #[test]
    fn test_signature_bound_to_asset_amount() {
        let store = MemStore::new();
        let asset = Asset::new();
        let owner = Dest::new();
        let issued = issue(&asset, &owner, 4);
        seed(&store, &issued);

        let mut data = TxData::new(
            vec![TxInput::spend(issued.outpoint(0))],
            vec![TxOutput::new(asset.id, 4, Script::True)],
        );
        let wrong = AssetAmount {
            asset_id: asset.id,
            amount: 5,
        };
        data.sign_input(0, &owner.keypair, &wrong).unwrap();
        assert!(matches!(
            rejected(Tx::new(data).validate(&store)),
            RejectReason::BadSignature { input: 0, .. }
        ));
    }

    #[test]
    fn test_issuance_requires_program_signature() {
        let store = MemStore::new();
        let asset = Asset::new();
        let mut data = TxData::new(
            vec![TxInput::issuance(asset.program.clone())],
            vec![TxOutput::new(asset.id, 1, Script::True)],
        );
        data.sign_input(0, &KeyPair::generate(), &AssetAmount::default())
            .unwrap();
        assert!(matches!(
            rejected(Tx::new(data).validate(&store)),
            RejectReason::BadSignature { input: 0, .. }
        ));
    }

    #[test]
    fn test_transfer_must_balance_exactly() {
        let store = MemStore::new();
        let asset = Asset::new();
        let owner = Dest::new();
        let issued = issue(&asset, &owner, 4);
        seed(&store, &issued);

        for amount in [3, 5] {
            let mut data = TxData::new(
                vec![TxInput::spend(issued.outpoint(0))],
                vec![TxOutput::new(asset.id, amount, Script::True)],
            );
            data.sign_input(0, &owner.keypair, &issued.outputs()[0].asset_amount)
                .unwrap();
            assert_eq!(
                rejected(Tx::new(data).validate(&store)),
                RejectReason::Unbalanced {
                    asset: asset.id,
                    inputs: 4,
                    outputs: amount
                }
            );
        }
    }

    #[test]
    fn test_issuance_only_covers_its_own_asset() {
        let store = MemStore::new();
        let minted = Asset::new();
        let other = Asset::new();
        let mut data = TxData::new(
            vec![TxInput::issuance(minted.program.clone())],
            vec![
                TxOutput::new(minted.id, 2, Script::True),
                TxOutput::new(other.id, 1, Script::True),
            ],
        );
        data.sign_input(0, &minted.keypair, &AssetAmount::default())
            .unwrap();
        assert_eq!(
            rejected(Tx::new(data).validate(&store)),
            RejectReason::Unbalanced {
                asset: other.id,
                inputs: 0,
                outputs: 1
            }
        );
    }

    #[test]
    fn test_output_overflow_is_malformed() {
        let store = MemStore::new();
        let asset = Asset::new();
        let mut data = TxData::new(
            vec![TxInput::issuance(asset.program.clone())],
            vec![
                TxOutput::new(asset.id, u64::MAX, Script::True),
                TxOutput::new(asset.id, 1, Script::True),
            ],
        );
        data.sign_input(0, &asset.keypair, &AssetAmount::default())
            .unwrap();
        assert!(matches!(
            rejected(Tx::new(data).validate(&store)),
            RejectReason::Malformed(_)
        ));
    }
}
