// src/peer.rs - bounded known/connected peer set with liveness.
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_PEERS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Peer {
    pub host: String,
    pub port: u16,
    pub last_seen: f64,
    pub connected: bool,
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Peer { host: host.into(), port, last_seen: 0.0, connected: false }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Owned exclusively by the Node. `add_peer` is a no-op once at capacity.
pub struct PeerRegistry {
    peers: HashMap<String, Peer>,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn new(max_peers: usize) -> Self {
        PeerRegistry { peers: HashMap::new(), max_peers }
    }

    pub fn add_peer(&mut self, peer: Peer) {
        let key = peer.key();
        if self.peers.contains_key(&key) {
            return;
        }
        if self.peers.len() >= self.max_peers {
            return;
        }
        self.peers.insert(key, peer);
    }

    pub fn remove_peer(&mut self, key: &str) {
        self.peers.remove(key);
    }

    pub fn update_peer_status(&mut self, key: &str, connected: bool) {
        if let Some(peer) = self.peers.get_mut(key) {
            peer.connected = connected;
            peer.last_seen = monotonic_now();
        }
    }

    pub fn get_known_peers(&self) -> Vec<Peer> {
        self.peers.values().cloned().collect()
    }

    pub fn get_connected_peers(&self) -> Vec<Peer> {
        self.peers.values().filter(|p| p.connected).cloned().collect()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        PeerRegistry::new(DEFAULT_MAX_PEERS)
    }
}

fn monotonic_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_peer_is_a_noop_once_at_capacity() {
        let mut registry = PeerRegistry::new(1);
        registry.add_peer(Peer::new("10.0.0.1", 8333));
        registry.add_peer(Peer::new("10.0.0.2", 8333));
        assert_eq!(registry.get_known_peers().len(), 1);
    }

    #[test]
    fn update_status_stamps_last_seen_and_filters_connected() {
        let mut registry = PeerRegistry::default();
        let peer = Peer::new("10.0.0.1", 8333);
        let key = peer.key();
        registry.add_peer(peer);
        assert!(registry.get_connected_peers().is_empty());

        registry.update_peer_status(&key, true);
        let connected = registry.get_connected_peers();
        assert_eq!(connected.len(), 1);
        assert!(connected[0].last_seen > 0.0);
    }
}
