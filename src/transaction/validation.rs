/// Validation logic for transactions separated from type definitions
use crate::codec;
use crate::error::{ChainError, Result};
use crate::transaction::types::{Transaction, COINBASE_REWARD};

impl Transaction {
    /// Stateless checks: shape, sealed id, and encoded size.
    ///
    /// Whether the referenced outputs exist and are unspent is checked
    /// against the UTXO set, see [`crate::blockchain::UtxoSet::apply_transaction`].
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} has no inputs",
                self.id_hex()
            )));
        }
        if self.outputs.is_empty() {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} has no outputs",
                self.id_hex()
            )));
        }

        if self.is_coinbase() {
            if self.outputs.len() != 1 || self.outputs[0].value != COINBASE_REWARD {
                return Err(ChainError::InvalidTransaction(format!(
                    "Coinbase {} must pay exactly one output of {}",
                    self.id_hex(),
                    COINBASE_REWARD
                )));
            }
        } else {
            for (i, input) in self.inputs.iter().enumerate() {
                if input.ref_tx_id.len() != 32 {
                    return Err(ChainError::InvalidTransaction(format!(
                        "Input {} of {} references a malformed transaction id ({} bytes)",
                        i,
                        self.id_hex(),
                        input.ref_tx_id.len()
                    )));
                }
                if input.ref_out_index < 0 {
                    return Err(ChainError::InvalidTransaction(format!(
                        "Input {} of {} has negative output index {}",
                        i,
                        self.id_hex(),
                        input.ref_out_index
                    )));
                }
            }
        }

        // Encoding enforces the record size limit.
        codec::encode_transaction(self)?;

        let expected = self.compute_id()?;
        if expected != self.id {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction id mismatch. Expected {}, but got {}.",
                hex::encode(expected),
                self.id_hex()
            )));
        }

        Ok(())
    }
}
