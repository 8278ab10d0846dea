//! Hash functions, transaction Merkle trees and the signature capability

use crate::types::{Hash, KeyImage, PublicKey, Signature};
use bitcoin_hashes::{sha256d, Hash as HashTrait};
use secp256k1::{schnorr, Message, Secp256k1, VerifyOnly, XOnlyPublicKey};
use sha2::{Digest, Sha256};

const KEY_IMAGE_DOMAIN: &[u8] = b"consensus-core/key-image";

/// FastHash: 𝔹* → ℍ
///
/// Single SHA-256, used for ids, Merkle trees and key images.
pub fn fast_hash(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// PowHash: 𝔹* → ℍ
///
/// Formula: SHA256(SHA256(blob))
pub fn pow_hash(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    fast_hash(&combined)
}

/// TreeDepth: ℕ → ℕ
///
/// Number of sibling hashes on the path from a leaf to the root of a tree with
/// `count` leaves: ⌈log₂ count⌉, 0 for one leaf.
pub fn tree_depth(count: usize) -> usize {
    let mut depth = 0;
    let mut width = count;
    while width > 1 {
        width = (width + 1) / 2;
        depth += 1;
    }
    depth
}

/// TreeHash: ℍ* → ℍ
///
/// Hashes adjacent pairs level by level; an odd trailing node is carried up
/// unchanged. The root of an empty list is the null hash.
pub fn tree_hash(hashes: &[Hash]) -> Hash {
    let mut level: Vec<Hash> = hashes.to_vec();
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [single] => *single,
                _ => [0u8; 32],
            })
            .collect();
    }
    level[0]
}

/// Sibling hashes of the first leaf, bottom level first
pub fn tree_branch(hashes: &[Hash]) -> Vec<Hash> {
    let mut branch = Vec::with_capacity(tree_depth(hashes.len()));
    let mut level: Vec<Hash> = hashes.to_vec();
    while level.len() > 1 {
        branch.push(level[1]);
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [single] => *single,
                _ => [0u8; 32],
            })
            .collect();
    }
    branch
}

/// Fold a leaf up through its branch.
///
/// Bit `i` of `path` (little-endian bit order) set means the running hash is
/// the right-hand child at level `i`. No path means the leftmost leaf.
pub fn tree_hash_from_branch(branch: &[Hash], leaf: &Hash, path: Option<&Hash>) -> Hash {
    let mut current = *leaf;
    for (i, sibling) in branch.iter().enumerate() {
        let is_right = path
            .and_then(|p| p.get(i / 8))
            .map(|byte| (byte >> (i % 8)) & 1 == 1)
            .unwrap_or(false);
        current = if is_right {
            hash_pair(sibling, &current)
        } else {
            hash_pair(&current, sibling)
        };
    }
    current
}

// ============================================================================
// SIGNATURES
// ============================================================================

/// Opaque signature capability used by transaction validation
pub trait SignatureScheme {
    /// Check `signature` over `message` by the owner of `key`
    fn verify(&self, message: &Hash, key: &PublicKey, signature: &Signature) -> bool;

    /// Deterministic spend tag of the output owned by `key`
    fn key_image(&self, key: &PublicKey) -> KeyImage;
}

/// BIP-340 Schnorr signatures over secp256k1 with x-only output keys
#[derive(Debug, Clone)]
pub struct Secp256k1Scheme {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Scheme {
    pub fn new() -> Self {
        Secp256k1Scheme { secp: Secp256k1::verification_only() }
    }
}

impl Default for Secp256k1Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureScheme for Secp256k1Scheme {
    fn verify(&self, message: &Hash, key: &PublicKey, signature: &Signature) -> bool {
        let Ok(public_key) = XOnlyPublicKey::from_slice(key) else {
            return false;
        };
        let Ok(sig) = schnorr::Signature::from_slice(&signature.to_bytes()) else {
            return false;
        };
        let Ok(msg) = Message::from_digest_slice(message) else {
            return false;
        };
        self.secp.verify_schnorr(&sig, &msg, &public_key).is_ok()
    }

    fn key_image(&self, key: &PublicKey) -> KeyImage {
        let mut data = Vec::with_capacity(KEY_IMAGE_DOMAIN.len() + key.len());
        data.extend_from_slice(KEY_IMAGE_DOMAIN);
        data.extend_from_slice(key);
        fast_hash(&data)
    }
}
