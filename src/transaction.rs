// src/transaction.rs - the transaction record, its canonical hash, and the
// signature contract over that hash.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::canonical::to_canonical_bytes;
use crate::crypto::{self, KeyPair, COINBASE_SENTINEL};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    #[serde(default)]
    pub fee: f64,
    pub timestamp: f64,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    pub txid: String,
}

impl Transaction {
    /// Build an unsigned transaction; `txid` is derived immediately from the
    /// canonical pre-image so it is stable even before signing.
    pub fn new(sender: String, receiver: String, amount: f64, fee: f64) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        Self::with_timestamp(sender, receiver, amount, fee, timestamp)
    }

    pub fn with_timestamp(
        sender: String,
        receiver: String,
        amount: f64,
        fee: f64,
        timestamp: f64,
    ) -> Self {
        let mut tx = Transaction {
            sender,
            receiver,
            amount,
            fee,
            timestamp,
            public_key: None,
            signature: None,
            txid: String::new(),
        };
        tx.txid = tx.calculate_txid().expect("canonical json of own fields cannot fail");
        tx
    }

    /// `txid = SHA256(canonical_json({sender, receiver, amount, fee, timestamp, public_key}))`.
    /// The signature never participates in this pre-image.
    pub fn calculate_txid(&self) -> Result<String> {
        let preimage = self.hash_preimage()?;
        Ok(hex::encode(crypto::sha256(&preimage)))
    }

    fn hash_preimage(&self) -> Result<Vec<u8>> {
        let value = json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
            "fee": self.fee,
            "timestamp": self.timestamp,
            "public_key": self.public_key,
        });
        to_canonical_bytes(&value)
    }

    /// Set `public_key` if absent, then sign the canonical pre-image.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        if self.public_key.is_none() {
            self.public_key = Some(keypair.public_key_hex());
        }
        self.txid = self.calculate_txid()?;
        let preimage = self.hash_preimage()?;
        let digest = crypto::sha256(&preimage);
        let signature = keypair.sign(&digest);
        self.signature = Some(hex::encode(signature.serialize_compact()));
        Ok(())
    }

    /// Reconstruct the pre-image, decode the public key, verify the
    /// signature. Any decoding failure yields `false`, never propagates.
    pub fn verify_signature(&self) -> bool {
        let (Some(signature), Some(public_key)) = (&self.signature, &self.public_key) else {
            return false;
        };
        let Ok(preimage) = self.hash_preimage() else {
            return false;
        };
        let digest = crypto::sha256(&preimage);
        crypto::verify(&digest, signature, public_key)
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE_SENTINEL
    }

    /// Structural checks plus signature verification. Coinbase transactions
    /// are exempt from the signature/public-key checks.
    pub fn is_valid(&self) -> bool {
        if self.amount <= 0.0 || self.fee < 0.0 {
            return false;
        }
        if self.sender.len() != 34 || self.receiver.len() != 34 {
            return false;
        }
        if self.is_coinbase() {
            return true;
        }
        if self.public_key.is_none() {
            return false;
        }
        self.verify_signature()
    }
}
