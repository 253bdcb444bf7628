//! Error types for UtxoChain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// An expected chain, block, or key is missing from the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A persisted chain already exists and cannot be initialized again.
    #[error("Blockchain already exists")]
    AlreadyExists,

    /// The spendable outputs of an address do not cover the requested amount.
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The underlying key-value store failed.
    #[error("Store error: {0}")]
    StoreIo(String),

    /// The nonce search was cancelled before a valid nonce was found.
    #[error("Mining aborted after {nonces_tried} nonces")]
    MiningAborted { nonces_tried: u64 },

    #[error("Invalid proof of work")]
    InvalidProofOfWork,

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::StoreIo(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::StoreIo(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::CorruptRecord(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message() {
        let err = ChainError::InsufficientFunds { needed: 60, available: 40 };
        assert_eq!(err.to_string(), "Insufficient funds: needed 60, available 40");
    }

    #[test]
    fn test_bincode_errors_are_corrupt_records() {
        let err: ChainError = bincode::deserialize::<u64>(&[1, 2]).unwrap_err().into();
        assert!(matches!(err, ChainError::CorruptRecord(_)));
    }
}
