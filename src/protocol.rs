// src/protocol.rs - length-framed JSON wire protocol between peers.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::block::Block;
use crate::error::{AnnalinkError, Result};
use crate::transaction::Transaction;

/// Cap on bulk `blocks` replies, per §4.8.
pub const MAX_BLOCKS_PER_REPLY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NetworkMessage {
    Handshake { version: String, best_height: u64 },
    GetBlocks { start_height: u64 },
    Blocks { blocks: Vec<Block> },
    NewTransaction(Transaction),
    NewBlock(Block),
    /// Optional peer-exchange extension (§9).
    GetPeers,
    Peers { peers: Vec<Value> },
}

/// Write `message` as a 4-byte big-endian length prefix followed by its
/// canonical-JSON envelope `{type, data}`.
pub async fn send_message(stream: &mut TcpStream, message: &NetworkMessage) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    let length = payload.len() as u32;
    stream.write_all(&length.to_be_bytes()).await?;
    stream.write_all(&payload).await?;
    Ok(())
}

/// Read a length-prefixed frame, looping on partial reads via `read_exact`.
/// EOF before a complete frame closes the connection silently.
pub async fn receive_message(stream: &mut TcpStream) -> Result<NetworkMessage> {
    let mut length_bytes = [0u8; 4];
    stream.read_exact(&mut length_bytes).await?;
    let length = u32::from_be_bytes(length_bytes) as usize;

    let mut buffer = vec![0u8; length];
    stream.read_exact(&mut buffer).await?;

    serde_json::from_slice(&buffer).map_err(|e| {
        AnnalinkError::malformed(format!("non-JSON or unrecognised frame: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_serialises_to_type_data_envelope() {
        let message = NetworkMessage::Handshake { version: "1.0".to_string(), best_height: 3 };
        let value: Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "handshake");
        assert_eq!(value["data"]["best_height"], 3);
    }

    #[test]
    fn get_blocks_round_trips() {
        let message = NetworkMessage::GetBlocks { start_height: 7 };
        let json = serde_json::to_string(&message).unwrap();
        let restored: NetworkMessage = serde_json::from_str(&json).unwrap();
        match restored {
            NetworkMessage::GetBlocks { start_height } => assert_eq!(start_height, 7),
            _ => panic!("wrong variant"),
        }
    }
}
