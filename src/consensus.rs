// src/consensus.rs - proof-of-work mining, validation, retargeting, halving.
use std::time::{Duration, Instant};

use crate::block::Block;
use crate::error::{AnnalinkError, Result};

const MINING_TIMEOUT: Duration = Duration::from_secs(300);
const DIFFICULTY_CAP: u32 = 256;
const DIFFICULTY_FLOOR: u32 = 1;
const REWARD_HALVING_PERIOD: u64 = 210_000;

/// Proof-of-work consensus parameters and operations.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    pub difficulty: u32,
    pub target_block_time: u64,
    pub adjustment_interval: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork { difficulty: 4, target_block_time: 600, adjustment_interval: 10 }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: u32, target_block_time: u64, adjustment_interval: usize) -> Self {
        ProofOfWork { difficulty, target_block_time, adjustment_interval }
    }

    /// Increment `nonce` monotonically, recomputing `hash` each step, until
    /// the leading hex prefix of length `difficulty` is all `'0'`. Bounded by
    /// a wall-clock timeout, after which the block is discarded.
    pub fn mine(&self, block: &mut Block) -> Result<()> {
        let target: String = std::iter::repeat('0').take(block.difficulty as usize).collect();
        let start = Instant::now();

        while !block.hash.starts_with(&target) {
            if start.elapsed() > MINING_TIMEOUT {
                return Err(AnnalinkError::MiningTimeout(MINING_TIMEOUT));
            }
            block.nonce += 1;
            block.hash = block.calculate_hash()?;
        }
        Ok(())
    }

    pub fn validate_proof(&self, block: &Block) -> bool {
        let target: String = std::iter::repeat('0').take(block.difficulty as usize).collect();
        block.hash.starts_with(&target)
    }

    /// Windowed retarget over the last `adjustment_interval` blocks. Unchanged
    /// until the chain is longer than the window.
    pub fn calculate_difficulty(&self, chain: &[Block]) -> u32 {
        if chain.len() <= self.adjustment_interval {
            return self.difficulty;
        }
        let recent = &chain[chain.len() - self.adjustment_interval..];
        let actual_time = recent.last().unwrap().timestamp - recent.first().unwrap().timestamp;
        let expected_time = self.target_block_time as f64 * (self.adjustment_interval - 1) as f64;

        if actual_time < expected_time / 2.0 {
            (self.difficulty + 1).min(DIFFICULTY_CAP)
        } else if actual_time > expected_time * 2.0 {
            self.difficulty.saturating_sub(1).max(DIFFICULTY_FLOOR)
        } else {
            self.difficulty
        }
    }
}

/// `50.0 / 2^(height / 210_000)`, clamped at zero.
pub fn mining_reward(height: u64) -> f64 {
    let halvings = height / REWARD_HALVING_PERIOD;
    if halvings >= 64 {
        return 0.0;
    }
    let reward = 50.0 / 2f64.powi(halvings as i32);
    reward.max(0.0)
}
