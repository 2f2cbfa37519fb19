// src/node.rs - the P2P node: inbound server, outbound sync loop, broadcast.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::block::Block;
use crate::chain::ChainManager;
use crate::error::Result;
use crate::peer::{Peer, PeerRegistry};
use crate::protocol::{self, NetworkMessage, MAX_BLOCKS_PER_REPLY};
use crate::transaction::Transaction;

const STARTUP_DELAY: Duration = Duration::from_secs(5);
const SYNC_INTERVAL: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const BULK_READ_TIMEOUT: Duration = Duration::from_secs(30);
const PROTOCOL_VERSION: &str = "1.0";

/// The node owns a reference to the chain manager for its whole lifetime and
/// a peer registry; there is no back-reference from either.
#[derive(Clone)]
pub struct Node {
    pub host: String,
    pub port: u16,
    chain: Arc<Mutex<ChainManager>>,
    peers: Arc<Mutex<PeerRegistry>>,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16, chain: ChainManager, max_peers: usize) -> Self {
        Node {
            host: host.into(),
            port,
            chain: Arc::new(Mutex::new(chain)),
            peers: Arc::new(Mutex::new(PeerRegistry::new(max_peers))),
        }
    }

    pub fn best_height(&self) -> u64 {
        self.chain.lock().unwrap().height()
    }

    pub fn add_known_peer(&self, peer: Peer) {
        self.peers.lock().unwrap().add_peer(peer);
    }

    pub fn connected_peers(&self) -> Vec<Peer> {
        self.peers.lock().unwrap().get_connected_peers()
    }

    /// Listen on `host:port`; for each inbound connection, read framed
    /// messages until EOF and dispatch by type. Every connection is
    /// independent; there is no persistent session state beyond the socket.
    pub async fn run_server(&self) -> Result<()> {
        let listener = TcpListener::bind(format!("{}:{}", self.host, self.port)).await?;
        info!("node listening on {}:{}", self.host, self.port);

        loop {
            let (socket, addr) = listener.accept().await?;
            info!("peer connected: {addr}");
            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = node.handle_connection(socket).await {
                    warn!("error handling peer {addr}: {e}");
                }
            });
        }
    }

    async fn handle_connection(&self, mut socket: TcpStream) -> Result<()> {
        loop {
            let message = match protocol::receive_message(&mut socket).await {
                Ok(m) => m,
                Err(_) => break, // EOF or malformed frame closes the connection silently
            };
            if let Some(response) = self.handle_message(message) {
                protocol::send_message(&mut socket, &response).await?;
            }
        }
        Ok(())
    }

    /// Pure dispatch: locks the chain only for the duration of the admission
    /// check, never across an await point.
    fn handle_message(&self, message: NetworkMessage) -> Option<NetworkMessage> {
        match message {
            NetworkMessage::Handshake { version, best_height } => {
                debug!("handshake from peer: version {version}, height {best_height}");
                Some(NetworkMessage::Handshake {
                    version: PROTOCOL_VERSION.to_string(),
                    best_height: self.best_height(),
                })
            }
            NetworkMessage::GetBlocks { start_height } => {
                let chain = self.chain.lock().unwrap();
                let blocks: Vec<Block> = chain
                    .chain()
                    .iter()
                    .skip(start_height as usize)
                    .take(MAX_BLOCKS_PER_REPLY)
                    .cloned()
                    .collect();
                Some(NetworkMessage::Blocks { blocks })
            }
            NetworkMessage::Blocks { blocks } => {
                self.apply_blocks(blocks);
                None
            }
            NetworkMessage::NewTransaction(transaction) => {
                let accepted = self.chain.lock().unwrap().add_transaction(transaction.clone());
                if accepted {
                    info!("admitted transaction {} to mempool", transaction.txid);
                }
                None
            }
            NetworkMessage::NewBlock(block) => {
                let accepted = self.chain.lock().unwrap().add_block(block.clone());
                if accepted {
                    info!("admitted block {} from peer", block.index);
                }
                None
            }
            NetworkMessage::GetPeers => {
                let peers = self.peers.lock().unwrap().get_known_peers();
                let peers = peers
                    .into_iter()
                    .map(|p| serde_json::to_value(p).unwrap())
                    .collect();
                Some(NetworkMessage::Peers { peers })
            }
            NetworkMessage::Peers { peers } => {
                let mut registry = self.peers.lock().unwrap();
                for value in peers {
                    if let Ok(peer) = serde_json::from_value::<Peer>(value) {
                        registry.add_peer(peer);
                    }
                }
                None
            }
        }
    }

    /// Apply §4.6/§4.8 admission: longer valid chain replaces wholesale;
    /// equal length attempts per-block admission; shorter is ignored.
    fn apply_blocks(&self, blocks: Vec<Block>) {
        if blocks.is_empty() {
            return;
        }
        let mut chain = self.chain.lock().unwrap();
        let local_len = chain.height();
        let received_len = blocks.len() as u64;

        if received_len > local_len {
            if chain.replace_chain(blocks) {
                info!("chain replaced, new height {}", chain.height());
            }
        } else if received_len == local_len {
            for block in blocks {
                if block.index >= local_len {
                    chain.add_block(block);
                }
            }
        }
    }

    /// After a startup delay, periodically pull blocks from each connected
    /// peer and apply admission/replacement.
    pub async fn run_sync_loop(&self) {
        tokio::time::sleep(STARTUP_DELAY).await;
        loop {
            self.sync_once().await;
            tokio::time::sleep(SYNC_INTERVAL).await;
        }
    }

    async fn sync_once(&self) {
        let peers = self.connected_peers();
        info!("syncing with {} connected peers", peers.len());
        for peer in peers {
            if let Err(e) = self.sync_with_peer(&peer).await {
                debug!("sync with {} failed: {e}", peer.key());
                self.peers.lock().unwrap().update_peer_status(&peer.key(), false);
            }
        }
    }

    async fn sync_with_peer(&self, peer: &Peer) -> Result<()> {
        let address = format!("{}:{}", peer.host, peer.port);
        let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&address))
            .await
            .map_err(|_| crate::error::AnnalinkError::network("connect timed out"))??;

        let handshake = NetworkMessage::Handshake {
            version: PROTOCOL_VERSION.to_string(),
            best_height: self.best_height(),
        };
        timeout(CONNECT_TIMEOUT, protocol::send_message(&mut stream, &handshake)).await.map_err(|_| {
            crate::error::AnnalinkError::network("handshake timed out")
        })??;
        timeout(CONNECT_TIMEOUT, protocol::receive_message(&mut stream)).await.map_err(|_| {
            crate::error::AnnalinkError::network("handshake reply timed out")
        })??;

        let local_len = self.best_height();
        protocol::send_message(&mut stream, &NetworkMessage::GetBlocks { start_height: 0 }).await?;

        let reply = timeout(BULK_READ_TIMEOUT, protocol::receive_message(&mut stream))
            .await
            .map_err(|_| crate::error::AnnalinkError::network("blocks reply timed out"))??;

        if let NetworkMessage::Blocks { blocks } = reply {
            let received_len = blocks.len() as u64;
            if received_len > local_len || received_len == local_len {
                self.apply_blocks(blocks);
            }
        }
        Ok(())
    }

    /// Iterate a snapshot of connected peers, open a connection each, send
    /// the message, close. Failures are logged and swallowed.
    pub async fn broadcast_block(&self, block: &Block) {
        self.broadcast(NetworkMessage::NewBlock(block.clone())).await;
    }

    pub async fn broadcast_transaction(&self, transaction: &Transaction) {
        self.broadcast(NetworkMessage::NewTransaction(transaction.clone())).await;
    }

    async fn broadcast(&self, message: NetworkMessage) {
        for peer in self.connected_peers() {
            let address = format!("{}:{}", peer.host, peer.port);
            match timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
                Ok(Ok(mut stream)) => {
                    if let Err(e) = protocol::send_message(&mut stream, &message).await {
                        error!("failed to broadcast to {address}: {e}");
                    }
                }
                Ok(Err(e)) => error!("failed to connect to {address}: {e}"),
                Err(_) => error!("connect to {address} timed out"),
            }
        }
    }

    pub fn mine_pending(&self, miner_address: &str) -> Option<Block> {
        self.chain.lock().unwrap().mine_pending(miner_address)
    }

    pub fn add_transaction(&self, transaction: Transaction) -> bool {
        self.chain.lock().unwrap().add_transaction(transaction)
    }

    pub fn get_balance(&self, address: &str) -> f64 {
        self.chain.lock().unwrap().get_balance(address)
    }

    pub fn snapshot_chain(&self) -> Vec<Block> {
        self.chain.lock().unwrap().chain().to_vec()
    }

    pub fn snapshot_pending(&self) -> Vec<Transaction> {
        self.chain.lock().unwrap().pending_transactions().to_vec()
    }

    pub fn known_peers(&self) -> Vec<Peer> {
        self.peers.lock().unwrap().get_known_peers()
    }

    /// Aggregate chain summary for `GET /blockchain`: height, difficulty,
    /// pending count, and the reward the next mined block would pay.
    pub fn chain_summary(&self) -> (u64, u32, usize, f64) {
        let chain = self.chain.lock().unwrap();
        let reward = crate::consensus::mining_reward(chain.height());
        (chain.height(), chain.difficulty(), chain.pending_transactions().len(), reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ProofOfWork;
    use crate::storage::Storage;

    fn test_node() -> Node {
        let storage = Storage::open_in_memory().unwrap();
        let chain = ChainManager::open(storage, ProofOfWork::new(0, 600, 10)).unwrap();
        Node::new("127.0.0.1", 0, chain, 10)
    }

    #[test]
    fn handshake_reply_carries_local_height() {
        let node = test_node();
        let reply = node.handle_message(NetworkMessage::Handshake { version: "1.0".into(), best_height: 0 });
        match reply {
            Some(NetworkMessage::Handshake { best_height, .. }) => assert_eq!(best_height, 1),
            _ => panic!("expected handshake reply"),
        }
    }

    #[test]
    fn get_blocks_caps_reply_at_max_blocks_per_reply() {
        let node = test_node();
        let reply = node.handle_message(NetworkMessage::GetBlocks { start_height: 0 });
        match reply {
            Some(NetworkMessage::Blocks { blocks }) => assert!(blocks.len() <= MAX_BLOCKS_PER_REPLY),
            _ => panic!("expected blocks reply"),
        }
    }
}
