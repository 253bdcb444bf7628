use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use std::collections::HashMap;

use super::chain::{Block, Ledger};

/// Rejects a block body in which two inputs reference the same output.
pub fn validate_no_double_spend(transactions: &[Transaction]) -> Result<()> {
    let mut seen_inputs: HashMap<(&[u8], i64), [u8; 32]> = HashMap::new();
    for tx in transactions {
        if tx.is_coinbase() {
            continue;
        }
        for input in &tx.inputs {
            let key = (input.ref_tx_id.as_slice(), input.ref_out_index);
            if let Some(conflicting_tx_hash) = seen_inputs.get(&key) {
                return Err(ChainError::InvalidTransaction(format!(
                    "Double spend detected in block. Output {}:{} is spent by both {} and {}",
                    hex::encode(&input.ref_tx_id),
                    input.ref_out_index,
                    hex::encode(conflicting_tx_hash),
                    tx.id_hex()
                )));
            }
            seen_inputs.insert(key, tx.id);
        }
    }
    Ok(())
}

/// Summary of a successful chain audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    pub blocks: u64,
    pub transactions: u64,
}

/// Checks a single stored block without consulting its ancestors.
pub fn validate_block(ledger: &Ledger, block: &Block) -> Result<()> {
    if block.transactions.is_empty() {
        return Err(ChainError::InvalidBlock(format!(
            "Block {} has no transactions",
            block.hash_str()
        )));
    }

    for tx in &block.transactions {
        tx.validate()?;
    }

    if !ledger.proof_of_work().validate(block) {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid Proof-of-Work: block {} does not meet difficulty {}.",
            block.hash_str(),
            ledger.difficulty()
        )));
    }

    validate_no_double_spend(&block.transactions)
}

impl Ledger {
    /// Audits every block from tip to genesis.
    ///
    /// Each block must carry its own recomputed digest, meet the target,
    /// hold only well-formed transactions, and link to a stored parent. The
    /// walk must end at a block with no previous hash. Finally the chain is
    /// replayed to confirm every spend references an unspent output it is
    /// authorized to use.
    pub fn verify(&self) -> Result<ChainReport> {
        let mut report = ChainReport {
            blocks: 0,
            transactions: 0,
        };
        let mut reached_genesis = false;

        for block in self.iter() {
            let block = block?;
            validate_block(self, &block)?;
            report.blocks += 1;
            report.transactions += block.transactions.len() as u64;
            reached_genesis = block.is_genesis();
        }

        if !reached_genesis {
            return Err(ChainError::InvalidBlock(
                "Chain walk did not end at a genesis block".to_string(),
            ));
        }

        self.utxo_set()?;
        Ok(report)
    }
}
