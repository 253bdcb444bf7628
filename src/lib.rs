//! UtxoChain - a single-node proof-of-work ledger with an unspent-output
//! transaction model.
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the persistent ledger, UTXO queries and auditing
//! - [`transaction`] - Transaction types, coinbase and transfer construction
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work sealing with cancellable nonce search
//!
//! ## Storage
//! - [`codec`] - Deterministic binary encoding of blocks and transactions
//! - [`persistence`] - Key-value store abstraction (SQLite and in-memory)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Storage
// ============================================================================
pub mod codec;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
