//! Proof-of-work sealing and auditing.
//!
//! A block digest is `SHA256(prev_hash || transactions_digest || be64(nonce) || be64(difficulty))`.
//! It is valid when, read as a big-endian 256-bit integer, it is strictly
//! below `2^(256 - difficulty)`. The nonce search is sequential from zero, so
//! identical inputs always produce the same winning nonce.

use crate::blockchain::{Block, Sha256Hash};
use crate::error::{ChainError, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Leading zero bits required by default.
pub const DEFAULT_DIFFICULTY: u32 = 18;

/// Nonces tried between two cancellation checks by default.
pub const DEFAULT_CHECK_INTERVAL: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
    target: Sha256Hash,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            difficulty: DEFAULT_DIFFICULTY,
            target: Self::target_for(DEFAULT_DIFFICULTY),
        }
    }
}

impl ProofOfWork {
    /// Accepts difficulties in `1..=255`.
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty == 0 || difficulty > 255 {
            return Err(ChainError::Config(format!(
                "difficulty must be between 1 and 255, got {}",
                difficulty
            )));
        }
        Ok(ProofOfWork {
            difficulty,
            target: Self::target_for(difficulty),
        })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// `1 << (256 - difficulty)` as 32 big-endian bytes.
    pub fn target(&self) -> &Sha256Hash {
        &self.target
    }

    fn target_for(difficulty: u32) -> Sha256Hash {
        let bit = 256 - difficulty as usize;
        let mut target = [0u8; 32];
        target[31 - bit / 8] = 1 << (bit % 8);
        target
    }

    pub fn digest(&self, prev_hash: &[u8], transactions_digest: &Sha256Hash, nonce: u64) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(prev_hash);
        hasher.update(transactions_digest);
        hasher.update(nonce.to_be_bytes());
        hasher.update(u64::from(self.difficulty).to_be_bytes());
        hasher.finalize().into()
    }

    /// Byte-wise comparison of big-endian arrays is numeric comparison.
    pub fn meets_target(&self, hash: &Sha256Hash) -> bool {
        hash < &self.target
    }

    /// Searches nonces from zero until the digest falls below the target.
    ///
    /// Fails with [`ChainError::MiningAborted`] when `control` is cancelled,
    /// its deadline passes, or the nonce space is exhausted.
    pub fn mine(
        &self,
        prev_hash: &[u8],
        transactions_digest: &Sha256Hash,
        control: &MiningControl,
    ) -> Result<(u64, Sha256Hash)> {
        debug!(
            "Finding nonce (difficulty {}, prev {})",
            self.difficulty,
            hex::encode(prev_hash)
        );
        let started = Instant::now();
        let interval = control.check_interval.max(1);
        let mut nonce: u64 = 0;

        loop {
            if nonce % interval == 0 && control.should_stop() {
                warn!("Mining aborted after {} nonces", nonce);
                return Err(ChainError::MiningAborted { nonces_tried: nonce });
            }

            let hash = self.digest(prev_hash, transactions_digest, nonce);
            if self.meets_target(&hash) {
                info!(
                    "Found nonce {} in {:.3}s: {}",
                    nonce,
                    started.elapsed().as_secs_f64(),
                    hex::encode(hash)
                );
                return Ok((nonce, hash));
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => return Err(ChainError::MiningAborted { nonces_tried: u64::MAX }),
            };
        }
    }

    /// Recomputes the digest from the stored nonce; never searches.
    ///
    /// The recomputed digest must also equal the block's stored hash.
    pub fn validate(&self, block: &Block) -> bool {
        let digest = self.digest(
            block.prev_hash_bytes(),
            &Block::transactions_digest(&block.transactions),
            block.nonce,
        );
        digest == block.hash && self.meets_target(&digest)
    }
}

/// Cancellation handle for a nonce search.
///
/// Clones share the same cancellation flag, so one clone can be handed to a
/// signal handler while another drives [`ProofOfWork::mine`].
#[derive(Debug, Clone)]
pub struct MiningControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    check_interval: u64,
}

impl Default for MiningControl {
    fn default() -> Self {
        MiningControl {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl MiningControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives up once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
