// src/lib.rs - Annalink node library
//! A proof-of-work cryptocurrency node: an append-only chain of
//! cryptographically linked blocks, a mempool of signed transactions, an
//! adjustable-difficulty mining loop, durable relational persistence, and a
//! length-framed peer sync protocol.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod node;
pub mod peer;
pub mod protocol;
pub mod storage;
pub mod transaction;
pub mod wallet;

pub use block::Block;
pub use chain::ChainManager;
pub use config::AnnalinkConfig;
pub use consensus::ProofOfWork;
pub use crypto::KeyPair;
pub use error::{AnnalinkError, Result};
pub use node::Node;
pub use peer::{Peer, PeerRegistry};
pub use storage::Storage;
pub use transaction::Transaction;
pub use wallet::Wallet;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for Annalink binaries.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
