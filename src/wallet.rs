// src/wallet.rs - wallet key persistence: plain JSON, or the same bytes
// XORed with a repeated SHA256(password). The XOR scheme is deliberately
// documented as non-cryptographic (§9); a real implementation should
// substitute an authenticated cipher.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, KeyPair};
use crate::error::{AnnalinkError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct WalletFile {
    private_key: String,
    address: String,
}

pub struct Wallet {
    pub keypair: KeyPair,
}

impl Wallet {
    pub fn generate() -> Self {
        Wallet { keypair: KeyPair::generate() }
    }

    pub fn address(&self) -> &str {
        &self.keypair.address
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        let file = WalletFile {
            private_key: self.keypair.private_key_hex(),
            address: self.keypair.address.clone(),
        };
        let bytes = serde_json::to_vec(&file)?;
        let bytes = match password {
            Some(password) => xor_obfuscate(&bytes, password),
            None => bytes,
        };
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let bytes = match password {
            Some(password) => xor_obfuscate(&bytes, password), // XOR is its own inverse
            None => bytes,
        };
        let file: WalletFile = serde_json::from_slice(&bytes)
            .map_err(|_| AnnalinkError::Wallet("wallet file is not valid JSON (wrong password?)".into()))?;
        let keypair = KeyPair::from_private_key_hex(&file.private_key)?;
        Ok(Wallet { keypair })
    }
}

fn xor_obfuscate(data: &[u8], password: &str) -> Vec<u8> {
    let key = crypto::sha256(password.as_bytes());
    data.iter().enumerate().map(|(i, b)| b ^ key[i % key.len()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_wallet_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::generate();
        wallet.save_to_file(&path, None).unwrap();

        let loaded = Wallet::load_from_file(&path, None).unwrap();
        assert_eq!(loaded.address(), wallet.address());
    }

    #[test]
    fn xor_obfuscated_wallet_file_round_trips_with_correct_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let wallet = Wallet::generate();
        wallet.save_to_file(&path, Some("hunter2")).unwrap();

        let loaded = Wallet::load_from_file(&path, Some("hunter2")).unwrap();
        assert_eq!(loaded.address(), wallet.address());
    }

    #[test]
    fn wrong_password_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let wallet = Wallet::generate();
        wallet.save_to_file(&path, Some("correct horse")).unwrap();

        assert!(Wallet::load_from_file(&path, Some("wrong password")).is_err());
    }
}
