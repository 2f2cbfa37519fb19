// src/crypto.rs - key generation, Base58Check addresses, WIF import/export.
use ripemd::{Digest as RipemdDigest, Ripemd160};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{AnnalinkError, Result};

/// Length in characters of every textual address, coinbase sentinel included.
pub const ADDRESS_LEN: usize = 34;
/// Sentinel address that denotes the coinbase (no real counterparty).
pub const COINBASE_SENTINEL: &str = "00000000000000000000000000000000";

const ADDRESS_VERSION: u8 = 0x00;
const WIF_VERSION: u8 = 0x80;

/// A secp256k1 keypair plus the derived address, the unit of wallet identity.
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: String,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        let address = derive_address(&public_key);
        KeyPair { secret_key, public_key, address }
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let address = derive_address(&public_key);
        KeyPair { secret_key, public_key, address }
    }

    /// Import a private key from its 32-byte big-endian hex form.
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)?;
        let secret_key = SecretKey::from_slice(&bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// 32-byte big-endian private key, hex encoded.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// 64 raw bytes (x||y) of the uncompressed public key, hex encoded with
    /// no `0x04` prefix — the exact form stored in transactions.
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key.serialize_uncompressed()[1..])
    }

    /// Sign `message` (already a 32-byte digest) with this keypair.
    pub fn sign(&self, digest: &[u8; 32]) -> secp256k1::ecdsa::Signature {
        let secp = Secp256k1::new();
        let message = Message::from_digest(*digest);
        secp.sign_ecdsa(&message, &self.secret_key)
    }

    /// Export to Wallet Import Format: Base58Check over
    /// `version(0x80) || private_key(32) || compression_flag(0x01)?`.
    pub fn to_wif(&self, compressed: bool) -> String {
        let mut payload = vec![WIF_VERSION];
        payload.extend_from_slice(&self.secret_key.secret_bytes());
        if compressed {
            payload.push(0x01);
        }
        base58check_encode(&payload)
    }

    pub fn from_wif(wif: &str) -> Result<Self> {
        let payload = base58check_decode(wif)?;
        let key_bytes = match payload.len() {
            33 if payload[0] == WIF_VERSION => &payload[1..33],
            34 if payload[0] == WIF_VERSION && payload[33] == 0x01 => &payload[1..33],
            _ => return Err(AnnalinkError::malformed("unrecognised WIF payload length")),
        };
        let secret_key = SecretKey::from_slice(key_bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }
}

/// Decode a 64-byte raw (x||y) hex public key back into a curve point,
/// reconstructing the uncompressed SEC1 prefix byte.
pub fn public_key_from_hex(hex_str: &str) -> Result<PublicKey> {
    let raw = hex::decode(hex_str)?;
    if raw.len() != 64 {
        return Err(AnnalinkError::malformed("public key must be 64 raw bytes"));
    }
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(&raw);
    PublicKey::from_slice(&uncompressed).map_err(AnnalinkError::from)
}

/// Verify `signature` over `digest` was produced by `public_key_hex`.
/// Any decoding failure yields `false`, never propagates.
pub fn verify(digest: &[u8; 32], signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(public_key) = public_key_from_hex(public_key_hex) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = secp256k1::ecdsa::Signature::from_compact(&sig_bytes) else {
        return false;
    };
    let secp = Secp256k1::new();
    let message = Message::from_digest(*digest);
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

fn derive_address(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed(); // 0x04 || x || y
    let sha = Sha256::digest(uncompressed);
    let mut ripemd_hasher = Ripemd160::new();
    ripemd_hasher.update(sha);
    let pubkey_hash = ripemd_hasher.finalize();

    let mut payload = vec![ADDRESS_VERSION];
    payload.extend_from_slice(&pubkey_hash);
    base58check_encode(&payload)
}

/// Decode, length-check (25 bytes), and checksum-verify a Base58Check address.
pub fn is_valid_address(address: &str) -> bool {
    if address.len() != ADDRESS_LEN {
        return false;
    }
    if address == COINBASE_SENTINEL {
        return true;
    }
    base58check_decode(address).is_ok()
}

fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut full = payload.to_vec();
    full.extend_from_slice(&checksum[..4]);
    bs58::encode(full).into_string()
}

/// Decode Base58Check, requiring the trailing 4 bytes to be the double-SHA256
/// checksum of everything before them. Returns the payload (version + hash).
fn base58check_decode(encoded: &str) -> Result<Vec<u8>> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| AnnalinkError::malformed(format!("invalid base58: {e}")))?;
    if decoded.len() < 5 {
        return Err(AnnalinkError::malformed("base58check payload too short"));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = double_sha256(payload);
    if checksum != &expected[..4] {
        return Err(AnnalinkError::malformed("base58check checksum mismatch"));
    }
    Ok(payload.to_vec())
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trips_through_base58check() {
        let kp = KeyPair::generate();
        assert_eq!(kp.address.len(), ADDRESS_LEN);
        assert!(is_valid_address(&kp.address));
    }

    #[test]
    fn public_key_hex_has_no_prefix_and_is_64_bytes() {
        let kp = KeyPair::generate();
        let raw = hex::decode(kp.public_key_hex()).unwrap();
        assert_eq!(raw.len(), 64);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = KeyPair::generate();
        let digest = sha256(b"hello world");
        let sig = kp.sign(&digest);
        let sig_hex = hex::encode(sig.serialize_compact());
        assert!(verify(&digest, &sig_hex, &kp.public_key_hex()));
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let kp = KeyPair::generate();
        let digest = sha256(b"hello world");
        let sig = kp.sign(&digest);
        let sig_hex = hex::encode(sig.serialize_compact());
        let other_digest = sha256(b"goodbye world");
        assert!(!verify(&other_digest, &sig_hex, &kp.public_key_hex()));
    }

    #[test]
    fn wif_round_trips_the_private_key() {
        let kp = KeyPair::generate();
        let wif = kp.to_wif(true);
        let recovered = KeyPair::from_wif(&wif).unwrap();
        assert_eq!(kp.private_key_hex(), recovered.private_key_hex());
        assert_eq!(kp.address, recovered.address);
    }

    #[test]
    fn coinbase_sentinel_is_a_valid_address() {
        assert!(is_valid_address(COINBASE_SENTINEL));
    }

    #[test]
    fn corrupted_address_checksum_is_rejected() {
        let kp = KeyPair::generate();
        let mut mangled = kp.address.clone();
        let last = mangled.pop().unwrap();
        mangled.push(if last == '1' { '2' } else { '1' });
        assert!(!is_valid_address(&mangled) || mangled == kp.address);
    }
}
