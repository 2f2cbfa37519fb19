// src/chain.rs - mempool admission, genesis, block admission, balance, and
// chain replacement. The chain manager owns the storage handle, the
// in-memory chain, and the mempool exclusively.
use log::{info, warn};

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::consensus::{self, ProofOfWork};
use crate::crypto::COINBASE_SENTINEL;
use crate::error::Result;
use crate::storage::Storage;
use crate::transaction::Transaction;

pub struct ChainManager {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    pow: ProofOfWork,
    storage: Storage,
}

impl ChainManager {
    /// Open storage, load the chain, or construct and persist genesis if the
    /// store is empty.
    pub fn open(storage: Storage, pow: ProofOfWork) -> Result<Self> {
        let chain = storage.load_all_blocks()?;
        let mut manager = ChainManager { chain, pending_transactions: Vec::new(), pow, storage };
        if manager.chain.is_empty() {
            manager.create_genesis_block()?;
        }
        Ok(manager)
    }

    fn create_genesis_block(&mut self) -> Result<()> {
        info!("creating genesis block");
        let genesis_tx = Transaction::new(
            COINBASE_SENTINEL.to_string(),
            COINBASE_SENTINEL.to_string(),
            0.0,
            0.0,
        );
        let mut genesis = Block::new(0, vec![genesis_tx], GENESIS_PREVIOUS_HASH.to_string(), self.pow.difficulty);
        self.pow.mine(&mut genesis)?;
        self.storage.save_block(&genesis)?;
        self.chain.push(genesis);
        info!("genesis block created and saved");
        Ok(())
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn latest_block(&self) -> &Block {
        self.chain.last().expect("chain always has at least the genesis block")
    }

    pub fn height(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty
    }

    /// Reject if not structurally valid, if the sender's balance cannot cover
    /// `amount + fee`, or if the sender already has a pending transaction.
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        if !transaction.is_valid() {
            warn!("invalid transaction rejected: {}", transaction.txid);
            return false;
        }
        let balance = self.get_balance(&transaction.sender);
        if balance < transaction.amount + transaction.fee {
            warn!("insufficient balance for transaction: {}", transaction.txid);
            return false;
        }
        if self.pending_transactions.iter().any(|p| p.sender == transaction.sender) {
            warn!("double spend attempt rejected: {}", transaction.txid);
            return false;
        }
        self.pending_transactions.push(transaction);
        true
    }

    /// Package the mempool into a candidate block behind a coinbase reward
    /// and mine it. On success, admits the block, clears the mempool, and
    /// retargets difficulty. On timeout, the mempool is preserved.
    pub fn mine_pending(&mut self, miner_address: &str) -> Option<Block> {
        let reward = consensus::mining_reward(self.height());
        let coinbase = Transaction::new(
            COINBASE_SENTINEL.to_string(),
            miner_address.to_string(),
            reward,
            0.0,
        );

        let mut transactions = vec![coinbase];
        transactions.extend(self.pending_transactions.clone());

        let mut candidate = Block::new(
            self.height(),
            transactions,
            self.latest_block().hash.clone(),
            self.pow.difficulty,
        );

        info!("mining block {} with {} transactions", candidate.index, self.pending_transactions.len());
        match self.pow.mine(&mut candidate) {
            Ok(()) => {}
            Err(_) => {
                warn!("mining timed out at height {}", candidate.index);
                return None;
            }
        }

        if self.add_block(candidate.clone()) {
            self.pending_transactions.clear();
            self.pow.difficulty = self.pow.calculate_difficulty(&self.chain);
            info!("block {} mined and added to chain", candidate.index);
            Some(candidate)
        } else {
            None
        }
    }

    /// Validate against the current tip; if valid, append in memory and
    /// persist.
    pub fn add_block(&mut self, block: Block) -> bool {
        if block.is_valid(Some(self.latest_block())) {
            if let Err(e) = self.storage.save_block(&block) {
                warn!("storage failure while saving block {}: {e}", block.index);
                return false;
            }
            info!("block {} added to chain", block.index);
            self.chain.push(block);
            true
        } else {
            warn!("invalid block rejected: {}", block.index);
            false
        }
    }

    pub fn is_chain_valid(&self) -> bool {
        Self::chain_is_valid(&self.chain)
    }

    fn chain_is_valid(chain: &[Block]) -> bool {
        for i in 1..chain.len() {
            if !chain[i].is_valid(Some(&chain[i - 1])) {
                return false;
            }
        }
        true
    }

    /// Accept `candidate` only if it is strictly longer, valid end to end,
    /// and shares the current chain's genesis block.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        if candidate.first().map(|b| &b.hash) != self.chain.first().map(|b| &b.hash) {
            return false;
        }
        if !Self::chain_is_valid(&candidate) {
            return false;
        }
        for block in &candidate {
            if let Err(e) = self.storage.save_block(block) {
                warn!("storage failure while persisting replacement chain: {e}");
                return false;
            }
        }
        self.chain = candidate;
        true
    }

    /// Full-history scan: `Σ(amount where receiver=a) − Σ(amount+fee where sender=a)`.
    pub fn get_balance(&self, address: &str) -> f64 {
        let mut balance = 0.0;
        for block in &self.chain {
            for tx in &block.transactions {
                if tx.sender == address {
                    balance -= tx.amount + tx.fee;
                }
                if tx.receiver == address {
                    balance += tx.amount;
                }
            }
        }
        balance
    }

    pub fn close(self) {
        self.storage.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn fresh_manager(difficulty: u32) -> ChainManager {
        let storage = Storage::open_in_memory().unwrap();
        ChainManager::open(storage, ProofOfWork::new(difficulty, 600, 10)).unwrap()
    }

    #[test]
    fn genesis_has_single_sentinel_transaction() {
        let manager = fresh_manager(0);
        assert_eq!(manager.chain().len(), 1);
        let genesis = &manager.chain()[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.transactions.len(), 1);
        assert_eq!(genesis.transactions[0].sender, COINBASE_SENTINEL);
        assert_eq!(genesis.transactions[0].receiver, COINBASE_SENTINEL);
        assert_eq!(genesis.transactions[0].amount, 0.0);
    }

    #[test]
    fn mining_empty_mempool_pays_reward_to_miner() {
        let mut manager = fresh_manager(1);
        let miner = KeyPair::generate().address;
        let block = manager.mine_pending(&miner).unwrap();
        assert_eq!(manager.chain().len(), 2);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].amount, consensus::mining_reward(1));
        assert_eq!(block.transactions[0].receiver, miner);
    }

    #[test]
    fn balance_accounting_after_transfer() {
        let mut manager = fresh_manager(1);
        let miner_kp = KeyPair::generate();
        manager.mine_pending(&miner_kp.address).unwrap();
        assert_eq!(manager.get_balance(&miner_kp.address), 50.0);

        let receiver = KeyPair::generate().address;
        let mut tx = Transaction::new(miner_kp.address.clone(), receiver.clone(), 10.0, 1.0);
        tx.sign(&miner_kp).unwrap();
        assert!(manager.add_transaction(tx.clone()));
        let mined = manager.mine_pending(&miner_kp.address).unwrap();
        assert_eq!(mined.transactions.len(), 2);

        let expected = 50.0 - 11.0 + consensus::mining_reward(2);
        assert!((manager.get_balance(&miner_kp.address) - expected).abs() < 1e-9);
        assert_eq!(manager.get_balance(&receiver), 10.0);
    }

    #[test]
    fn balance_nonnegative_blocks_overdraft_admission() {
        let mut manager = fresh_manager(1);
        let sender = KeyPair::generate();
        let mut tx = Transaction::new(sender.address.clone(), KeyPair::generate().address, 100.0, 0.0);
        tx.sign(&sender).unwrap();
        assert!(!manager.add_transaction(tx));
    }

    #[test]
    fn mempool_rejects_second_pending_tx_from_same_sender() {
        let mut manager = fresh_manager(1);
        let sender = KeyPair::generate();
        manager.mine_pending(&sender.address).unwrap(); // funds sender

        let mut tx1 = Transaction::new(sender.address.clone(), KeyPair::generate().address, 1.0, 0.0);
        tx1.sign(&sender).unwrap();
        let mut tx2 = Transaction::new(sender.address.clone(), KeyPair::generate().address, 1.0, 0.0);
        tx2.sign(&sender).unwrap();

        assert!(manager.add_transaction(tx1));
        assert!(!manager.add_transaction(tx2));
    }

    #[test]
    fn replace_chain_rejects_shorter_or_equal_candidates() {
        let mut manager = fresh_manager(0);
        let candidate = manager.chain().to_vec();
        assert!(!manager.replace_chain(candidate));
    }

    #[test]
    fn replace_chain_with_longer_valid_chain_from_shared_genesis() {
        let mut node_a = fresh_manager(0);
        let miner_a = KeyPair::generate().address;
        node_a.mine_pending(&miner_a).unwrap();
        node_a.mine_pending(&miner_a).unwrap();
        assert_eq!(node_a.height(), 3);

        // node_b must share node_a's genesis for replacement to be eligible.
        let genesis = node_a.chain()[0].clone();
        let mut node_b = {
            let mut storage = Storage::open_in_memory().unwrap();
            storage.save_block(&genesis).unwrap();
            ChainManager::open(storage, ProofOfWork::new(0, 600, 10)).unwrap()
        };
        let miner_b = KeyPair::generate().address;
        for _ in 0..4 {
            node_b.mine_pending(&miner_b).unwrap();
        }
        assert_eq!(node_b.height(), 5);

        assert!(node_a.replace_chain(node_b.chain().to_vec()));
        assert_eq!(node_a.height(), 5);
        assert!(node_a.is_chain_valid());
    }
}
