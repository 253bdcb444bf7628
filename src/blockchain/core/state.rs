use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxOutput};
use std::collections::{HashMap, HashSet};

use super::chain::{Ledger, Sha256Hash};

/// A transaction holding outputs still spendable by the scanned address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentTransaction {
    pub transaction: Transaction,
    /// Indices of the outputs locked to the address and not yet spent.
    pub indices: Vec<i64>,
}

impl UnspentTransaction {
    pub fn outputs(&self) -> impl Iterator<Item = (i64, &TxOutput)> + '_ {
        self.indices
            .iter()
            .filter_map(move |&i| self.transaction.outputs.get(i as usize).map(|out| (i, out)))
    }
}

/// Result of a first-fit selection of outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    pub accumulated: u64,
    /// Hex transaction id with the chosen output indices, in discovery order.
    pub selection: Vec<(String, Vec<i64>)>,
}

impl Ledger {
    /// Walks the chain newest to oldest collecting outputs locked to `address`
    /// that no later input owned by `address` has spent.
    pub fn scan_unspent(&self, address: &str) -> Result<Vec<UnspentTransaction>> {
        let mut spent: HashMap<String, HashSet<i64>> = HashMap::new();
        let mut unspent = Vec::new();

        for block in self.iter() {
            let block = block?;

            // Spends inside this block must hide outputs created earlier in
            // the same block, so inputs are recorded first.
            for tx in &block.transactions {
                if tx.is_coinbase() {
                    continue;
                }
                for input in &tx.inputs {
                    if input.can_unlock(address) {
                        spent
                            .entry(hex::encode(&input.ref_tx_id))
                            .or_default()
                            .insert(input.ref_out_index);
                    }
                }
            }

            for tx in &block.transactions {
                let spent_here = spent.get(&tx.id_hex());
                let indices: Vec<i64> = tx
                    .outputs
                    .iter()
                    .enumerate()
                    .map(|(i, out)| (i as i64, out))
                    .filter(|(i, out)| {
                        out.can_be_unlocked(address)
                            && !spent_here.is_some_and(|set| set.contains(i))
                    })
                    .map(|(i, _)| i)
                    .collect();

                if !indices.is_empty() {
                    unspent.push(UnspentTransaction {
                        transaction: tx.clone(),
                        indices,
                    });
                }
            }
        }

        Ok(unspent)
    }

    /// Transactions with at least one output still spendable by `address`.
    pub fn unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .scan_unspent(address)?
            .into_iter()
            .map(|u| u.transaction)
            .collect())
    }

    /// Unspent outputs locked to `address`.
    pub fn find_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        let unspent = self.scan_unspent(address)?;
        Ok(unspent
            .iter()
            .flat_map(|u| u.outputs().map(|(_, out)| out.clone()))
            .collect())
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        Ok(self
            .find_utxo(address)?
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value)))
    }

    /// Greedily picks outputs of `address` until `amount` is covered.
    ///
    /// Stops at the first output that brings the total to `amount` or more.
    /// When the address cannot cover `amount` the full available total is
    /// returned; callers decide whether that is a failure.
    pub fn spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs> {
        let mut result = SpendableOutputs::default();

        'work: for entry in self.scan_unspent(address)? {
            let tx_id = entry.transaction.id_hex();
            for (index, out) in entry.outputs() {
                if result.accumulated >= amount {
                    break 'work;
                }
                result.accumulated = result.accumulated.saturating_add(out.value);
                match result.selection.last_mut() {
                    Some((id, indices)) if *id == tx_id => indices.push(index),
                    _ => result.selection.push((tx_id.clone(), vec![index])),
                }
                if result.accumulated >= amount {
                    break 'work;
                }
            }
        }

        Ok(result)
    }

    /// Replays the chain oldest to newest into a fresh [`UtxoSet`].
    pub fn utxo_set(&self) -> Result<UtxoSet> {
        let mut blocks = self.iter().collect::<Result<Vec<_>>>()?;
        blocks.reverse();

        let mut state = UtxoSet::new();
        for block in &blocks {
            for tx in &block.transactions {
                state.apply_transaction(tx)?;
            }
        }
        Ok(state)
    }
}

/// Position of an output: creating transaction id and output index.
pub type OutPoint = (Sha256Hash, i64);

/// Derived index of every unspent output on the chain.
///
/// Equivalent to [`Ledger::scan_unspent`] on chains whose inputs always
/// carry the lock key of the output they spend, which [`Ledger::append`]
/// enforces.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    pub utxo_set: HashMap<OutPoint, TxOutput>,
    pub address_balances: HashMap<String, u64>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        *self.address_balances.get(address).unwrap_or(&0)
    }

    pub fn get(&self, tx_id: &Sha256Hash, index: i64) -> Option<&TxOutput> {
        self.utxo_set.get(&(*tx_id, index))
    }

    pub fn len(&self) -> usize {
        self.utxo_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxo_set.is_empty()
    }

    /// Spends the inputs of `tx` and records its outputs.
    ///
    /// Every input must reference an unspent output whose lock key equals the
    /// input's auth tag, and the spent value must cover the outputs. On error
    /// the set is left unchanged.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let mut consumed = Vec::new();
        let mut input_total = 0u64;

        if !tx.is_coinbase() {
            for input in &tx.inputs {
                let ref_id: Sha256Hash = input.ref_tx_id.as_slice().try_into().map_err(|_| {
                    ChainError::InvalidTransaction(format!(
                        "Input of {} references malformed id {}",
                        tx.id_hex(),
                        hex::encode(&input.ref_tx_id)
                    ))
                })?;
                let point = (ref_id, input.ref_out_index);

                let out = self.utxo_set.get(&point).ok_or_else(|| {
                    ChainError::InvalidTransaction(format!(
                        "Input {}:{} of {} not found in UTXO set",
                        hex::encode(ref_id),
                        input.ref_out_index,
                        tx.id_hex()
                    ))
                })?;

                if !out.can_be_unlocked(&input.auth_tag) {
                    return Err(ChainError::InvalidTransaction(format!(
                        "Input {}:{} of {} is locked to {}, not {}",
                        hex::encode(ref_id),
                        input.ref_out_index,
                        tx.id_hex(),
                        out.lock_key,
                        input.auth_tag
                    )));
                }

                if consumed.contains(&point) {
                    return Err(ChainError::InvalidTransaction(format!(
                        "Transaction {} spends {}:{} twice",
                        tx.id_hex(),
                        hex::encode(ref_id),
                        input.ref_out_index
                    )));
                }
                input_total = input_total.checked_add(out.value).ok_or_else(|| {
                    ChainError::InvalidTransaction(format!("Inputs of {} overflow", tx.id_hex()))
                })?;
                consumed.push(point);
            }
        }

        let output_total = tx.total_output().ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Outputs of {} overflow", tx.id_hex()))
        })?;
        if !tx.is_coinbase() && output_total > input_total {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} spends {} but creates {}",
                tx.id_hex(),
                input_total,
                output_total
            )));
        }

        for index in 0..tx.outputs.len() as i64 {
            if self.utxo_set.contains_key(&(tx.id, index)) {
                return Err(ChainError::InvalidTransaction(format!(
                    "Transaction {} already has unspent outputs",
                    tx.id_hex()
                )));
            }
        }

        for point in consumed {
            if let Some(out) = self.utxo_set.remove(&point) {
                let balance = self.address_balances.entry(out.lock_key).or_insert(0);
                *balance = balance.saturating_sub(out.value);
            }
        }

        for (index, out) in tx.outputs.iter().enumerate() {
            let balance = self.address_balances.entry(out.lock_key.clone()).or_insert(0);
            *balance = balance.saturating_add(out.value);
            self.utxo_set.insert((tx.id, index as i64), out.clone());
        }

        Ok(())
    }

    /// Checks that `transactions` apply in order without touching `self`.
    pub fn check_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let mut temp_state = self.clone();
        for tx in transactions {
            temp_state.apply_transaction(tx)?;
        }
        Ok(())
    }
}
