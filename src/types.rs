//! Core CryptoNote-style types for consensus validation

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Hash type: 256-bit digest
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Natural number type
pub type Natural = u64;

/// Amount in atomic units
pub type Amount = u64;

/// Per-block proof-of-work difficulty
pub type Difficulty = u64;

/// Block height (index of the block in the main chain, genesis = 0)
pub type BlockHeight = u32;

/// Spendable-key commitment carried by outputs (x-only public key)
pub type PublicKey = [u8; 32];

/// Key image: unique spend tag derived from an output key
pub type KeyImage = [u8; 32];

/// Height-binding input: ℐ_base = ℕ₃₂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseInput {
    pub block_index: BlockHeight,
}

/// Key input: ℐ_key = ℕ × ℕ₃₂ × 𝕂
///
/// `output_index` is the global index of the spent output among all outputs
/// of the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyInput {
    pub amount: Amount,
    pub output_index: u32,
    pub key_image: KeyImage,
}

/// Transaction Input: ℐ = ℐ_base ⊎ ℐ_key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionInput {
    Base(BaseInput),
    Key(KeyInput),
}

/// Transaction Output: 𝒯 = ℕ × 𝕂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: Amount,
    pub key: PublicKey,
}

/// Schnorr signature split into its two 32-byte halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    pub r: Hash,
    pub s: Hash,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Signature { r, s }
    }
}

/// Transaction: 𝒯𝒳 = ℕ₈ × ℕ × ℐ* × 𝒯* × 𝔹* × 𝒮*
///
/// `unlock_time` below [`crate::constants::MAX_BLOCK_NUMBER`] is a block
/// height, anything above it a UNIX timestamp. One signature per key input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub unlock_time: u64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub extra: ByteString,
    pub signatures: Vec<Signature>,
}

impl Transaction {
    /// Iterate over the key inputs of the transaction
    pub fn key_inputs(&self) -> impl Iterator<Item = &KeyInput> {
        self.inputs.iter().filter_map(|input| match input {
            TransactionInput::Key(key) => Some(key),
            TransactionInput::Base(_) => None,
        })
    }

    /// Σ outputs.amount, `None` on overflow
    pub fn output_sum(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
    }
}

/// Block Header: ℋ = ℕ₈ × ℕ₈ × ℕ × ℍ × ℕ₃₂
///
/// For major version ≥ 2 the timestamp and nonce are serialized inside the
/// parent block section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub timestamp: u64,
    pub previous_block_hash: Hash,
    pub nonce: u32,
}

/// Merge-mining parent block embedded in version ≥ 2 headers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParentBlock {
    pub major_version: u8,
    pub minor_version: u8,
    pub previous_block_hash: Hash,
    pub transaction_count: u16,
    pub base_transaction_branch: Vec<Hash>,
    pub base_transaction: Transaction,
    pub blockchain_branch: Vec<Hash>,
}

/// Block: ℬ = ℋ × 𝒫 × 𝒯𝒳 × ℍ*
///
/// `parent_block` is only meaningful (and only serialized) for major
/// version ≥ 2.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub parent_block: ParentBlock,
    pub base_transaction: Transaction,
    pub transaction_hashes: Vec<Hash>,
}

/// A serialized block together with the serialized transactions it references
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBlock {
    pub block: ByteString,
    pub transactions: Vec<ByteString>,
}

/// Sliding window of (timestamp, cumulative difficulty) pairs.
///
/// The oldest pair is evicted once more than `capacity` pairs are pushed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DifficultyWindow {
    timestamps: VecDeque<u64>,
    cumulative_difficulties: VecDeque<Difficulty>,
    capacity: usize,
}

impl DifficultyWindow {
    pub fn new(capacity: usize) -> Self {
        DifficultyWindow {
            timestamps: VecDeque::with_capacity(capacity),
            cumulative_difficulties: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, timestamp: u64, cumulative_difficulty: Difficulty) {
        if self.capacity == 0 {
            return;
        }
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
            self.cumulative_difficulties.pop_front();
        }
        self.timestamps.push_back(timestamp);
        self.cumulative_difficulties.push_back(cumulative_difficulty);
    }

    /// Timestamps and cumulative difficulties, oldest first
    pub fn as_slices(&mut self) -> (&[u64], &[Difficulty]) {
        (
            self.timestamps.make_contiguous(),
            self.cumulative_difficulties.make_contiguous(),
        )
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Output as seen by the spending side: who may spend it and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub key: PublicKey,
    pub unlock_time: u64,
    pub height: BlockHeight,
}

/// Per-block bookkeeping kept by the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: Hash,
    pub height: BlockHeight,
    pub timestamp: u64,
    pub difficulty: Difficulty,
    pub cumulative_difficulty: Difficulty,
    pub size: usize,
    pub already_generated_coins: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_window_evicts_oldest() {
        let mut window = DifficultyWindow::new(3);
        for i in 1..=5u64 {
            window.push(i * 10, i);
        }
        assert_eq!(window.len(), 3);
        let (timestamps, cumulative) = window.as_slices();
        assert_eq!(timestamps, &[30, 40, 50][..]);
        assert_eq!(cumulative, &[3, 4, 5][..]);
    }

    #[test]
    fn test_signature_bytes_layout() {
        let sig = Signature { r: [1; 32], s: [2; 32] };
        let bytes = sig.to_bytes();
        assert_eq!(&bytes[..32], &[1u8; 32]);
        assert_eq!(Signature::from_bytes(&bytes), sig);
    }

    #[test]
    fn test_output_sum_overflow() {
        let out = TransactionOutput { amount: u64::MAX, key: [0; 32] };
        let tx = Transaction { outputs: vec![out, out], ..Default::default() };
        assert_eq!(tx.output_sum(), None);
    }
}
