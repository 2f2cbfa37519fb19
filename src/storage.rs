// src/storage.rs - durable relational store: blocks, transactions, chain_state.
use rusqlite::{params, Connection};

use crate::block::Block;
use crate::error::{AnnalinkError, Result};

/// SQLite-backed persistence. Owned exclusively by the chain manager; every
/// read and write funnels through here.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(AnnalinkError::from)?;
        let storage = Storage { conn };
        storage.initialize()?;
        Ok(storage)
    }

    /// In-memory store, used by tests that do not need durability.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AnnalinkError::from)?;
        let storage = Storage { conn };
        storage.initialize()?;
        Ok(storage)
    }

    fn initialize(&self) -> Result<()> {
        // `index` collides with reserved words in common SQL dialects; the
        // blocks primary key is named `block_index` instead.
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                block_index   INTEGER PRIMARY KEY,
                timestamp     REAL NOT NULL,
                previous_hash TEXT NOT NULL,
                nonce         INTEGER NOT NULL,
                hash          TEXT NOT NULL,
                difficulty    INTEGER NOT NULL,
                data          TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS transactions (
                txid        TEXT PRIMARY KEY,
                sender      TEXT NOT NULL,
                receiver    TEXT NOT NULL,
                amount      REAL NOT NULL,
                fee         REAL NOT NULL,
                timestamp   REAL NOT NULL,
                signature   TEXT,
                block_index INTEGER NOT NULL REFERENCES blocks(block_index)
            );
            CREATE TABLE IF NOT EXISTS chain_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Insert-or-replace the block row and every contained transaction row in
    /// a single atomic commit. A crash-restart after this returns must
    /// observe the block.
    pub fn save_block(&mut self, block: &Block) -> Result<()> {
        let data = serde_json::to_string(block)?;
        let tx = self.conn.transaction().map_err(AnnalinkError::from)?;
        tx.execute(
            "INSERT OR REPLACE INTO blocks
                (block_index, timestamp, previous_hash, nonce, hash, difficulty, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                block.index as i64,
                block.timestamp,
                block.previous_hash,
                block.nonce as i64,
                block.hash,
                block.difficulty as i64,
                data,
            ],
        )?;
        for txn in &block.transactions {
            tx.execute(
                "INSERT OR REPLACE INTO transactions
                    (txid, sender, receiver, amount, fee, timestamp, signature, block_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    txn.txid,
                    txn.sender,
                    txn.receiver,
                    txn.amount,
                    txn.fee,
                    txn.timestamp,
                    txn.signature,
                    block.index as i64,
                ],
            )?;
        }
        tx.commit().map_err(AnnalinkError::from)
    }

    pub fn load_block(&self, index: u64) -> Result<Option<Block>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM blocks WHERE block_index = ?1")?;
        let mut rows = stmt.query(params![index as i64])?;
        match rows.next()? {
            Some(row) => {
                let data: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    pub fn load_latest_block(&self) -> Result<Option<Block>> {
        let max_index: Option<i64> = self
            .conn
            .query_row("SELECT MAX(block_index) FROM blocks", [], |row| row.get(0))
            .map_err(AnnalinkError::from)?;
        match max_index {
            Some(index) => self.load_block(index as u64),
            None => Ok(None),
        }
    }

    pub fn load_all_blocks(&self) -> Result<Vec<Block>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM blocks ORDER BY block_index ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut blocks = Vec::new();
        for data in rows {
            blocks.push(serde_json::from_str(&data?)?);
        }
        Ok(blocks)
    }

    pub fn save_chain_state(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO chain_state (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn load_chain_state(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM chain_state WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn transaction_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Idempotent; closing an already-closed store is a no-op.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, COINBASE_SENTINEL};
    use crate::transaction::Transaction;

    fn sample_block(index: u64, previous_hash: &str) -> Block {
        let tx = Transaction::new(
            COINBASE_SENTINEL.to_string(),
            KeyPair::generate().address,
            50.0,
            0.0,
        );
        Block::new(index, vec![tx], previous_hash.to_string(), 0)
    }

    #[test]
    fn saved_block_survives_reopen_at_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.db");
        let path_str = path.to_str().unwrap();

        let block = sample_block(0, "0");
        {
            let mut storage = Storage::open(path_str).unwrap();
            storage.save_block(&block).unwrap();
        }

        let reopened = Storage::open(path_str).unwrap();
        let loaded = reopened.load_latest_block().unwrap().unwrap();
        assert_eq!(loaded.hash, block.hash);
    }

    #[test]
    fn load_all_blocks_is_ordered_by_index() {
        let mut storage = Storage::open_in_memory().unwrap();
        let genesis = sample_block(0, "0");
        let next = sample_block(1, &genesis.hash);
        storage.save_block(&next).unwrap();
        storage.save_block(&genesis).unwrap();

        let all = storage.load_all_blocks().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].index, 0);
        assert_eq!(all[1].index, 1);
    }

    #[test]
    fn chain_state_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        storage.save_chain_state("difficulty", "4").unwrap();
        assert_eq!(storage.load_chain_state("difficulty").unwrap().as_deref(), Some("4"));
        assert_eq!(storage.load_chain_state("missing").unwrap(), None);
    }
}
