// src/block.rs - the block record, its canonical hash, and the embedded
// proof-of-work check.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::canonical::to_canonical_bytes;
use crate::crypto;
use crate::error::Result;
use crate::transaction::Transaction;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        difficulty: u32,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        Self::with_timestamp(index, transactions, previous_hash, timestamp, 0, difficulty)
    }

    pub fn with_timestamp(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        timestamp: f64,
        nonce: u64,
        difficulty: u32,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.calculate_hash().expect("canonical json of own fields cannot fail");
        block
    }

    /// `hash = SHA256(canonical_json({index, timestamp, transactions:[txid,...], previous_hash, nonce, difficulty}))`.
    /// Only transaction IDs participate in the pre-image, never full bodies.
    pub fn calculate_hash(&self) -> Result<String> {
        let txids: Vec<&str> = self.transactions.iter().map(|t| t.txid.as_str()).collect();
        let value = json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": txids,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
            "difficulty": self.difficulty,
        });
        let preimage = to_canonical_bytes(&value)?;
        Ok(hex::encode(crypto::sha256(&preimage)))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    fn satisfies_pow(&self) -> bool {
        let target: String = std::iter::repeat('0').take(self.difficulty as usize).collect();
        self.hash.starts_with(&target)
    }

    /// Recomputed hash matches, PoW target satisfied, every transaction
    /// structurally valid, and (when `previous` is supplied) linkage holds.
    pub fn is_valid(&self, previous: Option<&Block>) -> bool {
        let Ok(recomputed) = self.calculate_hash() else {
            return false;
        };
        if recomputed != self.hash {
            return false;
        }
        if !self.satisfies_pow() {
            return false;
        }
        for tx in &self.transactions {
            if !tx.is_valid() {
                return false;
            }
        }
        if let Some(previous) = previous {
            if self.previous_hash != previous.hash {
                return false;
            }
        }
        true
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.timestamp == other.timestamp
            && self.transactions == other.transactions
            && self.previous_hash == other.previous_hash
            && self.nonce == other.nonce
            && self.difficulty == other.difficulty
            && self.hash == other.hash
    }
}
