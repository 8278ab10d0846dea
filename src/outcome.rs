//! Terminal outcomes of block acceptance
//!
//! One [`BlockAcceptanceOutcome`] is produced per submitted block. Rejections
//! carry a [`RejectionReason`] from a closed set so callers can match on the
//! exact rule that failed.

use crate::error::DecodeError;
use crate::types::{Amount, BlockHeight, Difficulty, Hash, KeyImage};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockAcceptanceOutcome {
    AddedToMain,
    AlreadyExists,
    RejectedAsOrphaned,
    Rejected(RejectionReason),
}

impl BlockAcceptanceOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, BlockAcceptanceOutcome::AddedToMain)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, BlockAcceptanceOutcome::Rejected(_))
    }

    pub fn rejection_reason(&self) -> Option<&RejectionReason> {
        match self {
            BlockAcceptanceOutcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("malformed block: {0}")]
    Decode(DecodeError),

    #[error("previous block is unknown")]
    UnknownParent,

    #[error("major version {actual} not active, expected {expected}")]
    WrongVersion { expected: u8, actual: u8 },

    #[error("timestamp {timestamp} below median {median}")]
    TimestampTooLow { timestamp: u64, median: u64 },

    #[error("timestamp {timestamp} beyond future limit {limit}")]
    TimestampTooFarInFuture { timestamp: u64, limit: u64 },

    #[error("parent block size {size} exceeds {limit}")]
    ParentBlockTooBig { size: usize, limit: usize },

    #[error("parent block coinbase has no merge mining tag")]
    MergeMiningTagMissing,

    #[error("auxiliary chain merkle root does not match merge mining tag")]
    AuxiliaryRootMismatch,

    #[error("proof of work does not meet difficulty {difficulty}")]
    ProofOfWork { difficulty: Difficulty },

    #[error("coinbase: {0}")]
    Coinbase(#[from] CoinbaseError),

    #[error("transaction {hash:02x?} not available")]
    TransactionNotFound { hash: Hash },

    #[error("transaction {hash:02x?} listed twice")]
    DuplicateTransaction { hash: Hash },

    #[error("transaction {index}: {error}")]
    Transaction { index: usize, error: TransactionError },

    #[error("cumulative size {size} exceeds {limit}")]
    CumulativeSizeTooBig { size: usize, limit: usize },
}

/// Rule violations of the distinguished first transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinbaseError {
    #[error("no input")]
    NoInputs,

    #[error("more than one input")]
    ExtraInput,

    #[error("input is not height-binding")]
    WrongInputType,

    #[error("height {actual} below expected {expected}")]
    HeightLow { expected: BlockHeight, actual: BlockHeight },

    #[error("height {actual} above expected {expected}")]
    HeightHigh { expected: BlockHeight, actual: BlockHeight },

    #[error("unlock time {actual} below expected {expected}")]
    UnlockLow { expected: u64, actual: u64 },

    #[error("unlock time {actual} above expected {expected}")]
    UnlockHigh { expected: u64, actual: u64 },

    #[error("no outputs")]
    NoOutputs,

    #[error("output amount {0} is not a canonical denomination")]
    NonCanonicalOutput(Amount),

    #[error("output amounts overflow")]
    OutputOverflow,

    #[error("reward {actual} below expected {expected}")]
    RewardTooSmall { expected: Amount, actual: Amount },

    #[error("reward {actual} above expected {expected}")]
    RewardTooLarge { expected: Amount, actual: Amount },
}

/// Rule violations of ordinary (non-coinbase) transactions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("no inputs")]
    NoInputs,

    #[error("no outputs")]
    NoOutputs,

    #[error("height-binding input outside coinbase")]
    UnexpectedBaseInput,

    #[error("zero output amount")]
    ZeroOutput,

    #[error("input amounts overflow")]
    InputOverflow,

    #[error("output amounts overflow")]
    OutputOverflow,

    #[error("inputs {inputs} below outputs {outputs}")]
    InsufficientInputs { inputs: Amount, outputs: Amount },

    #[error("expected {expected} signatures, found {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("key image {0:02x?} used twice")]
    DuplicateKeyImage(KeyImage),

    #[error("key image {0:02x?} already spent")]
    KeyImageSpent(KeyImage),

    #[error("output {index} of amount {amount} does not exist")]
    OutputNotFound { amount: Amount, index: u32 },

    #[error("output {index} of amount {amount} still locked")]
    OutputLocked { amount: Amount, index: u32 },

    #[error("key image of input {0} does not belong to the spent output")]
    KeyImageMismatch(usize),

    #[error("invalid signature on input {0}")]
    InvalidSignature(usize),
}
