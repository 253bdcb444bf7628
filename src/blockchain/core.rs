// core.rs splits responsibilities into submodules: block and ledger storage,
// UTXO scans, and chain auditing.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
