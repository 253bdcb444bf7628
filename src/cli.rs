//! Helpers shared by the command-line binary: bind configuration to a
//! SQLite-backed ledger.

use crate::blockchain::Ledger;
use crate::config::Config;
use crate::error::Result;
use crate::miner::MiningControl;
use crate::persistence::Database;
use tracing::info;

pub fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open(&config.database.path)?;
    if db.is_empty()? {
        info!("Opened empty database at {}", config.database.path);
    } else {
        info!(
            "Opened database at {} ({} records)",
            config.database.path,
            db.len()?
        );
    }
    Ok(db)
}

/// Creates a new chain in the configured database.
pub fn create_ledger_from_config(
    config: &Config,
    address: &str,
    control: &MiningControl,
) -> Result<Ledger> {
    let db = open_database(config)?;
    Ledger::init_with(Box::new(db), address, config.proof_of_work()?, control)
}

/// Opens the existing chain in the configured database.
pub fn load_ledger_from_config(config: &Config) -> Result<Ledger> {
    let db = open_database(config)?;
    Ledger::open(Box::new(db), config.proof_of_work()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.database.path = dir.path().join("blocks.db").to_string_lossy().to_string();
        config.miner.difficulty = 8;
        config
    }

    #[test]
    fn test_create_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = temp_config(&dir);

        let tip = {
            let ledger = create_ledger_from_config(&config, "Alice", &MiningControl::new()).unwrap();
            ledger.tip()
        };

        let ledger = load_ledger_from_config(&config).unwrap();
        assert_eq!(ledger.tip(), tip);
        assert_eq!(ledger.balance("Alice").unwrap(), 100);
    }

    #[test]
    fn test_open_database_counts_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = temp_config(&dir);

        assert!(open_database(&config).unwrap().is_empty().unwrap());
        create_ledger_from_config(&config, "Alice", &MiningControl::new()).unwrap();

        // Genesis block plus the tip pointer.
        assert_eq!(open_database(&config).unwrap().len().unwrap(), 2);
    }

    #[test]
    fn test_load_without_chain() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = temp_config(&dir);
        assert!(matches!(
            load_ledger_from_config(&config),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_twice() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = temp_config(&dir);
        create_ledger_from_config(&config, "Alice", &MiningControl::new()).unwrap();
        assert!(matches!(
            create_ledger_from_config(&config, "Alice", &MiningControl::new()),
            Err(ChainError::AlreadyExists)
        ));
    }
}
