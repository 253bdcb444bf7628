/// Transaction types for UtxoChain
use crate::blockchain::{Ledger, Sha256Hash};
use crate::codec;
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Value granted by every coinbase transaction
pub const COINBASE_REWARD: u64 = 100;

/// Memo carried by the coinbase of the genesis block
pub const GENESIS_MEMO: &str = "First Transaction from Genesis";

/// Output index used by the single input of a coinbase transaction
pub const COINBASE_OUT_INDEX: i64 = -1;

/// References one output of a prior transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction holding the referenced output; empty for coinbase.
    pub ref_tx_id: Vec<u8>,
    /// Position of the referenced output; `-1` for coinbase.
    pub ref_out_index: i64,
    /// Plaintext claim on the referenced output. Must equal its lock key.
    pub auth_tag: String,
}

impl TxInput {
    pub fn can_unlock(&self, address: &str) -> bool {
        self.auth_tag == address
    }
}

/// A value locked to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub lock_key: String,
}

impl TxOutput {
    pub fn new(value: u64, lock_key: impl Into<String>) -> Self {
        TxOutput {
            value,
            lock_key: lock_key.into(),
        }
    }

    pub fn can_be_unlocked(&self, address: &str) -> bool {
        self.lock_key == address
    }
}

/// A value transfer: consumes prior outputs through `inputs`, creates `outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Sha256Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction and seals its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Transaction {
            id: [0u8; 32],
            inputs,
            outputs,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// SHA-256 over the encoding of this transaction with a zeroed id.
    pub fn compute_id(&self) -> Result<Sha256Hash> {
        let preimage = codec::encode_unsealed_transaction(&self.inputs, &self.outputs)?;
        Ok(Sha256::digest(&preimage).into())
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Reward transaction with no real predecessor.
    ///
    /// An empty `memo` is replaced by `"Coins to <address>"`.
    pub fn coinbase(reward_address: &str, memo: &str) -> Result<Self> {
        let memo = if memo.is_empty() {
            format!("Coins to {}", reward_address)
        } else {
            memo.to_string()
        };

        let input = TxInput {
            ref_tx_id: Vec::new(),
            ref_out_index: COINBASE_OUT_INDEX,
            auth_tag: memo,
        };
        let output = TxOutput::new(COINBASE_REWARD, reward_address);

        Transaction::new(vec![input], vec![output])
    }

    /// Moves `amount` from `from` to `to`, spending outputs found by a chain scan.
    ///
    /// Any value collected beyond `amount` is returned to `from` as a change
    /// output. Inputs appear in the order the scan discovered them.
    pub fn transfer(from: &str, to: &str, amount: u64, ledger: &Ledger) -> Result<Self> {
        if amount == 0 {
            return Err(ChainError::InvalidTransaction(
                "Transfer amount must be greater than zero".to_string(),
            ));
        }

        let spendable = ledger.spendable_outputs(from, amount)?;
        if spendable.accumulated < amount {
            return Err(ChainError::InsufficientFunds {
                needed: amount,
                available: spendable.accumulated,
            });
        }

        let mut inputs = Vec::new();
        for (tx_id, indices) in &spendable.selection {
            let ref_tx_id = hex::decode(tx_id).map_err(|e| {
                ChainError::CorruptRecord(format!("Invalid transaction id {}: {}", tx_id, e))
            })?;
            for index in indices {
                inputs.push(TxInput {
                    ref_tx_id: ref_tx_id.clone(),
                    ref_out_index: *index,
                    auth_tag: from.to_string(),
                });
            }
        }

        let mut outputs = vec![TxOutput::new(amount, to)];
        if spendable.accumulated > amount {
            outputs.push(TxOutput::new(spendable.accumulated - amount, from));
        }

        let tx = Transaction::new(inputs, outputs)?;
        debug!(
            "Built transfer {} ({} -> {}, amount {}, {} inputs)",
            tx.id_hex(),
            from,
            to,
            amount,
            tx.inputs.len()
        );
        Ok(tx)
    }

    /// Exactly one input, with an empty referenced id and index `-1`.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].ref_tx_id.is_empty()
            && self.inputs[0].ref_out_index == COINBASE_OUT_INDEX
    }

    /// Sum of all output values, `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}
