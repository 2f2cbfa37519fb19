// src/error.rs - error taxonomy for the Annalink node
use thiserror::Error;

/// Result type alias for Annalink operations
pub type Result<T> = std::result::Result<T, AnnalinkError>;

/// Error taxonomy for the node. Variants group by how the caller is expected
/// to react, not by which module raised them.
#[derive(Error, Debug)]
pub enum AnnalinkError {
    /// Bad Base58, wrong address length, non-hex signature, non-JSON frame.
    /// Reject the offending datum; state is untouched.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Failed structural, signature, balance, or double-spend check.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Failed hash, proof-of-work, linkage, or contained-transaction check.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Proof-of-work did not converge within the wall-clock bound.
    #[error("mining timed out after {0:?}")]
    MiningTimeout(std::time::Duration),

    /// Connect/read/write timeout or socket error.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Underlying store error. Treated as fatal by callers.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl AnnalinkError {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        AnnalinkError::MalformedInput(msg.into())
    }

    pub fn invalid_transaction<S: Into<String>>(msg: S) -> Self {
        AnnalinkError::InvalidTransaction(msg.into())
    }

    pub fn invalid_block<S: Into<String>>(msg: S) -> Self {
        AnnalinkError::InvalidBlock(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        AnnalinkError::NetworkFailure(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AnnalinkError::StorageFailure(msg.into())
    }

    /// Category used for log fields; mirrors the taxonomy of §7.
    pub fn category(&self) -> &'static str {
        match self {
            AnnalinkError::MalformedInput(_) => "malformed_input",
            AnnalinkError::InvalidTransaction(_) => "invalid_transaction",
            AnnalinkError::InvalidBlock(_) => "invalid_block",
            AnnalinkError::MiningTimeout(_) => "mining_timeout",
            AnnalinkError::NetworkFailure(_) => "network_failure",
            AnnalinkError::StorageFailure(_) => "storage_failure",
            AnnalinkError::Config(_) => "config",
            AnnalinkError::Wallet(_) => "wallet",
            AnnalinkError::Io(_) => "io",
            AnnalinkError::Json(_) => "serialization",
            AnnalinkError::Sqlite(_) => "storage_failure",
            AnnalinkError::Secp256k1(_) => "crypto",
            AnnalinkError::HexDecode(_) => "malformed_input",
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, AnnalinkError::NetworkFailure(_))
    }

    pub fn is_storage_fatal(&self) -> bool {
        matches!(self, AnnalinkError::StorageFailure(_) | AnnalinkError::Sqlite(_))
    }
}
