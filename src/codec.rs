//! Deterministic binary encoding of blocks and transactions.
//!
//! Records are encoded with bincode using fixed-width big-endian integers,
//! fields in declaration order, and a hard size limit. Decoding rejects
//! truncated input, trailing bytes, and oversized length prefixes with
//! [`ChainError::CorruptRecord`].

use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxInput, TxOutput};
use bincode::Options;
use serde::Serialize;

/// Upper bound on any encoded record, in bytes.
pub const MAX_RECORD_SIZE: u64 = 4 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_RECORD_SIZE)
        .reject_trailing_bytes()
}

/// Same field layout as [`Transaction`] with the id zeroed.
#[derive(Serialize)]
struct UnsealedTransaction<'a> {
    id: [u8; 32],
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
}

fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| ChainError::InvalidBlock(format!("Failed to encode {}: {}", what, e)))
}

pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    encode(block, "block")
}

pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    options()
        .deserialize(bytes)
        .map_err(|e| ChainError::CorruptRecord(format!("Failed to decode block: {}", e)))
}

pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    encode(tx, "transaction")
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    options()
        .deserialize(bytes)
        .map_err(|e| ChainError::CorruptRecord(format!("Failed to decode transaction: {}", e)))
}

/// Preimage of a transaction id.
pub fn encode_unsealed_transaction(inputs: &[TxInput], outputs: &[TxOutput]) -> Result<Vec<u8>> {
    encode(
        &UnsealedTransaction {
            id: [0u8; 32],
            inputs,
            outputs,
        },
        "transaction",
    )
}
