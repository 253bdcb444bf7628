// Thin re-export module: implementation is in `blockchain/core.rs` so block
// storage, UTXO queries and chain auditing live in separate files.

pub mod core;
pub use self::core::*;
