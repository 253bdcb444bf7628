//! Key-value persistence layer for UtxoChain
//!
//! The ledger only needs point reads, point writes, read-only snapshots and
//! atomic read-modify-write transactions from its store. [`KvStore`] captures
//! exactly that; [`Database`] backs it with SQLite and [`InMemoryStore`] with
//! a shared ordered map.

use crate::error::{ChainError, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Read access inside a transaction or snapshot.
pub trait KvRead {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Write access inside an [`KvStore::update`] transaction.
pub trait KvWrite: KvRead {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Abstraction for store backends.
///
/// `update` must commit every write made by the closure or none of them: an
/// error returned by the closure or by the backend leaves the store as it
/// was. `view` must observe a single consistent snapshot.
pub trait KvStore: Send + Sync {
    fn view(&self, f: &mut dyn FnMut(&dyn KvRead) -> Result<()>) -> Result<()>;

    fn update(&self, f: &mut dyn FnMut(&mut dyn KvWrite) -> Result<()>) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut value = None;
        self.view(&mut |txn| {
            value = txn.get(key)?;
            Ok(())
        })?;
        Ok(value)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(&mut |txn| txn.set(key, value))
    }
}

/// SQLite-backed store holding a single `kv` table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database at `path`. `":memory:"` is accepted.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ChainError::StoreIo(format!("Failed to create data dir {:?}: {}", parent, e))
                    })?;
                }
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| ChainError::StoreIo(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::StoreIo(format!("Failed to create kv table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

struct SqlTxn<'a> {
    conn: &'a Connection,
}

impl KvRead for SqlTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| ChainError::StoreIo(format!("Failed to read key: {}", e)))
    }
}

impl KvWrite for SqlTxn<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ChainError::StoreIo(format!("Failed to write key: {}", e)))?;
        Ok(())
    }
}

impl KvStore for Database {
    fn view(&self, f: &mut dyn FnMut(&dyn KvRead) -> Result<()>) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(|e| ChainError::StoreIo(format!("Failed to start read transaction: {}", e)))?;

        f(&SqlTxn { conn: &tx })?;

        tx.commit()
            .map_err(|e| ChainError::StoreIo(format!("Failed to finish read transaction: {}", e)))
    }

    fn update(&self, f: &mut dyn FnMut(&mut dyn KvWrite) -> Result<()>) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ChainError::StoreIo(format!("Failed to start transaction: {}", e)))?;

        // Dropping `tx` without commit rolls back.
        f(&mut SqlTxn { conn: &tx })?;

        tx.commit()
            .map_err(|e| ChainError::StoreIo(format!("Failed to commit transaction: {}", e)))
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
///
/// Clones share the same entries, so a clone can stand in for reopening a
/// persisted store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Writes a raw value outside of any transaction.
    pub fn insert_raw(&self, key: &[u8], value: &[u8]) {
        self.entries.write().insert(key.to_vec(), value.to_vec());
    }
}

struct MemSnapshot<'a> {
    entries: &'a BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvRead for MemSnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }
}

struct MemTxn<'a> {
    base: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvRead for MemTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .pending
            .get(key)
            .or_else(|| self.base.get(key))
            .cloned())
    }
}

impl KvWrite for MemTxn<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.pending.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl KvStore for InMemoryStore {
    fn view(&self, f: &mut dyn FnMut(&dyn KvRead) -> Result<()>) -> Result<()> {
        let entries = self.entries.read();
        f(&MemSnapshot { entries: &entries })
    }

    fn update(&self, f: &mut dyn FnMut(&mut dyn KvWrite) -> Result<()>) -> Result<()> {
        let mut entries = self.entries.write();
        let pending = {
            let mut txn = MemTxn {
                base: &entries,
                pending: BTreeMap::new(),
            };
            f(&mut txn)?;
            txn.pending
        };
        entries.extend(pending);
        Ok(())
    }
}
