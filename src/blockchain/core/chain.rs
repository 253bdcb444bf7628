use crate::codec;
use crate::error::{ChainError, Result};
use crate::miner::{MiningControl, ProofOfWork};
use crate::persistence::KvStore;
use crate::transaction::{Transaction, GENESIS_MEMO};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub type Sha256Hash = [u8; 32];

/// Store key holding the hash of the most recent block.
pub const TIP_KEY: &[u8] = b"tip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Sha256Hash,
    pub transactions: Vec<Transaction>,
    /// `None` only for the genesis block.
    pub prev_hash: Option<Sha256Hash>,
    pub nonce: u64,
}

impl Block {
    /// Seals a new block on top of `prev_hash` by running proof of work.
    pub fn mine(
        transactions: Vec<Transaction>,
        prev_hash: Option<Sha256Hash>,
        pow: &ProofOfWork,
        control: &MiningControl,
    ) -> Result<Self> {
        if transactions.is_empty() {
            return Err(ChainError::InvalidBlock(
                "A block must contain at least one transaction".to_string(),
            ));
        }

        let digest = Block::transactions_digest(&transactions);
        let prev_bytes: &[u8] = match &prev_hash {
            Some(hash) => hash,
            None => &[],
        };
        let (nonce, hash) = pow.mine(prev_bytes, &digest, control)?;

        Ok(Block {
            hash,
            transactions,
            prev_hash,
            nonce,
        })
    }

    /// `SHA256(concat(tx.id))` over the block's transactions in order.
    pub fn transactions_digest(transactions: &[Transaction]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.id);
        }
        hasher.finalize().into()
    }

    /// Previous hash as raw bytes; empty for genesis.
    pub fn prev_hash_bytes(&self) -> &[u8] {
        match &self.prev_hash {
            Some(hash) => hash,
            None => &[],
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Append-only chain of blocks persisted in a [`KvStore`].
///
/// The ledger is the only writer of block records and of the tip pointer.
/// Both are written in one store transaction, so at rest `store["tip"]`
/// always names a stored block.
pub struct Ledger {
    tip: Sha256Hash,
    store: Box<dyn KvStore>,
    pow: ProofOfWork,
}

impl Ledger {
    /// Creates a new chain whose genesis coinbase rewards `address`.
    pub fn init(store: Box<dyn KvStore>, address: &str, pow: ProofOfWork) -> Result<Self> {
        Self::init_with(store, address, pow, &MiningControl::default())
    }

    pub fn init_with(
        store: Box<dyn KvStore>,
        address: &str,
        pow: ProofOfWork,
        control: &MiningControl,
    ) -> Result<Self> {
        if store.contains(TIP_KEY)? {
            return Err(ChainError::AlreadyExists);
        }

        let coinbase = Transaction::coinbase(address, GENESIS_MEMO)?;
        let genesis = Block::mine(vec![coinbase], None, &pow, control)?;
        let encoded = codec::encode_block(&genesis)?;

        store.update(&mut |txn| {
            if txn.contains(TIP_KEY)? {
                return Err(ChainError::AlreadyExists);
            }
            txn.set(&genesis.hash, &encoded)?;
            txn.set(TIP_KEY, &genesis.hash)
        })?;

        info!("Genesis created: {}", genesis.hash_str());

        Ok(Ledger {
            tip: genesis.hash,
            store,
            pow,
        })
    }

    /// Attaches to an existing chain.
    ///
    /// The tip block is audited against `pow`, so opening with a different
    /// difficulty than the chain was built with fails.
    pub fn open(store: Box<dyn KvStore>, pow: ProofOfWork) -> Result<Self> {
        let tip = load_tip(store.as_ref())?.ok_or_else(|| {
            ChainError::NotFound("No existing blockchain found, create one first".to_string())
        })?;

        let ledger = Ledger { tip, store, pow };
        let tip_block = ledger.get_block(&tip)?;
        if !ledger.pow.validate(&tip_block) {
            return Err(ChainError::InvalidProofOfWork);
        }

        debug!("Opened ledger at tip {}", hex::encode(tip));
        Ok(ledger)
    }

    pub fn tip(&self) -> Sha256Hash {
        self.tip
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty()
    }

    pub fn get_block(&self, hash: &Sha256Hash) -> Result<Block> {
        read_block(self.store.as_ref(), hash)
    }

    /// Number of blocks from tip to genesis inclusive.
    pub fn height(&self) -> Result<u64> {
        let mut count = 0u64;
        for block in self.iter() {
            block?;
            count += 1;
        }
        Ok(count)
    }

    /// Seals `transactions` into a new block and advances the tip.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        self.append_with(transactions, &MiningControl::default())
    }

    /// Like [`Ledger::append`] with an explicit cancellation handle.
    ///
    /// Transactions are validated against the current UTXO set before any
    /// mining. On any error, including [`ChainError::MiningAborted`], nothing
    /// is written and the tip is unchanged.
    pub fn append_with(
        &mut self,
        transactions: Vec<Transaction>,
        control: &MiningControl,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(ChainError::InvalidBlock(
                "A block must contain at least one transaction".to_string(),
            ));
        }

        let stored_tip = load_tip(self.store.as_ref())?
            .ok_or_else(|| ChainError::NotFound("Tip pointer missing from store".to_string()))?;
        if stored_tip != self.tip {
            warn!(
                "In-memory tip {} differs from stored tip {}; using stored tip",
                hex::encode(self.tip),
                hex::encode(stored_tip)
            );
            self.tip = stored_tip;
        }

        for tx in &transactions {
            tx.validate()?;
        }
        super::validation::validate_no_double_spend(&transactions)?;
        self.utxo_set()?.check_transactions(&transactions)?;

        let block = Block::mine(transactions, Some(stored_tip), &self.pow, control)?;
        let encoded = codec::encode_block(&block)?;

        self.store.update(&mut |txn| {
            let current = txn.get(TIP_KEY)?;
            if current.as_deref() != Some(&stored_tip[..]) {
                return Err(ChainError::InvalidBlock(
                    "Chain tip advanced while mining; retry append".to_string(),
                ));
            }
            txn.set(&block.hash, &encoded)?;
            txn.set(TIP_KEY, &block.hash)
        })?;

        self.tip = block.hash;
        info!(
            "Appended block {} ({} transactions, nonce {})",
            block.hash_str(),
            block.transactions.len(),
            block.nonce
        );

        Ok(block)
    }

    /// Builds a transfer and appends it in its own block.
    pub fn send(&mut self, from: &str, to: &str, amount: u64) -> Result<Block> {
        let tx = Transaction::transfer(from, to, amount, self)?;
        self.append(vec![tx])
    }

    /// Walks blocks from tip to genesis, reading one block per step.
    pub fn iter(&self) -> LedgerIterator<'_> {
        LedgerIterator {
            current: Some(self.tip),
            store: self.store.as_ref(),
            visited: HashSet::new(),
        }
    }
}

/// Lazy tip-to-genesis walk over stored blocks.
///
/// Yields an error and stops on a missing block, an undecodable record, a
/// record stored under the wrong key, or a revisited hash.
pub struct LedgerIterator<'a> {
    current: Option<Sha256Hash>,
    store: &'a dyn KvStore,
    visited: HashSet<Sha256Hash>,
}

impl Iterator for LedgerIterator<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;

        if !self.visited.insert(hash) {
            return Some(Err(ChainError::CorruptRecord(format!(
                "Cycle detected at block {}",
                hex::encode(hash)
            ))));
        }

        match read_block(self.store, &hash) {
            Ok(block) => {
                self.current = block.prev_hash;
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

fn load_tip(store: &dyn KvStore) -> Result<Option<Sha256Hash>> {
    match store.get(TIP_KEY)? {
        None => Ok(None),
        Some(bytes) => {
            let tip: Sha256Hash = bytes.as_slice().try_into().map_err(|_| {
                ChainError::CorruptRecord(format!("Tip hash has length {}", bytes.len()))
            })?;
            Ok(Some(tip))
        }
    }
}

fn read_block(store: &dyn KvStore, hash: &Sha256Hash) -> Result<Block> {
    let bytes = store
        .get(hash)?
        .ok_or_else(|| ChainError::NotFound(format!("Block {}", hex::encode(hash))))?;
    let block = codec::decode_block(&bytes)?;
    if &block.hash != hash {
        return Err(ChainError::CorruptRecord(format!(
            "Block stored under {} has hash {}",
            hex::encode(hash),
            block.hash_str()
        )));
    }
    Ok(block)
}
