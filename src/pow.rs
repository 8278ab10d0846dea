//! Proof of work check

use crate::block::proof_of_work_hash;
use crate::types::*;

/// 256-bit unsigned integer, least significant word first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct U256([u64; 4]);

impl U256 {
    /// Interpret 32 bytes as a little-endian integer
    fn from_le_bytes(bytes: &Hash) -> Self {
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let start = i * 8;
            *word = u64::from_le_bytes([
                bytes[start], bytes[start + 1], bytes[start + 2], bytes[start + 3],
                bytes[start + 4], bytes[start + 5], bytes[start + 6], bytes[start + 7],
            ]);
        }
        U256(words)
    }

    /// Multiply by a 64-bit factor, `None` if the product needs more than 256 bits
    fn checked_mul_u64(&self, factor: u64) -> Option<Self> {
        let mut result = [0u64; 4];
        let mut carry: u128 = 0;
        for (i, &word) in self.0.iter().enumerate() {
            let product = u128::from(word) * u128::from(factor) + carry;
            result[i] = product as u64;
            carry = product >> 64;
        }
        if carry != 0 {
            return None;
        }
        Some(U256(result))
    }
}

/// CheckHash: ℍ × ℕ → {true, false}
///
/// Formula: LE256(hash) × difficulty < 2^256
pub fn check_hash(hash: &Hash, difficulty: Difficulty) -> bool {
    if difficulty == 0 {
        return false;
    }
    U256::from_le_bytes(hash).checked_mul_u64(difficulty).is_some()
}

/// CheckProofOfWork: ℬ × ℕ → {true, false}
///
/// The proof-of-work hash folds in the parent block for version ≥ 2.
pub fn check_proof_of_work(block: &Block, difficulty: Difficulty) -> bool {
    check_hash(&proof_of_work_hash(block), difficulty)
}
