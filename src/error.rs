//! Error types for consensus validation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Invalid currency configuration: {0}")]
    Configuration(String),

    #[error("Block validation failed: {0}")]
    BlockValidation(String),

    #[error("Transaction validation failed: {0}")]
    TransactionValidation(String),

    #[error("Economic validation failed: {0}")]
    EconomicValidation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Structural failures of the binary codec.
///
/// Every malformed input maps to one of these; the decoder never panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("varint is not minimally encoded")]
    NonCanonicalVarint,

    #[error("varint overflows 64 bits")]
    VarintOverflow,

    #[error("{field} value {value} out of range")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("unknown input tag {0:#04x}")]
    UnknownInputTag(u8),

    #[error("unknown output tag {0:#04x}")]
    UnknownOutputTag(u8),

    #[error("unsupported block major version {0}")]
    UnsupportedMajorVersion(u8),

    #[error("parent block declares zero transactions")]
    EmptyParentBlock,

    #[error("merge mining branch depth {0} too large")]
    MergeMiningDepthTooLarge(u64),

    #[error("{0} trailing bytes after object")]
    TrailingBytes(usize),
}
