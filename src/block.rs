//! Block identity: hashing blobs, ids and proof-of-work input
//!
//! Hashing blob: header fields without the parent section, followed by the
//! Merkle root of all transaction hashes (coinbase first) and their count.
//! For version ≥ 2 the proof of work is computed over the parent block's
//! hashing blob instead, which commits to this block through the merge-mining
//! tag in the parent coinbase.

use crate::constants::BLOCK_MAJOR_VERSION_1;
use crate::crypto::{fast_hash, pow_hash, tree_hash, tree_hash_from_branch};
use crate::serialization::{serialize_transaction, serialize_transaction_prefix, varint_size, BinaryWriter};
use crate::types::*;

/// TxHash: 𝒯𝒳 → ℍ
pub fn transaction_hash(tx: &Transaction) -> Hash {
    fast_hash(&serialize_transaction(tx))
}

/// Hash of everything but the signatures: the message that is signed
pub fn transaction_prefix_hash(tx: &Transaction) -> Hash {
    fast_hash(&serialize_transaction_prefix(tx))
}

/// Transaction hashes of the block, coinbase first
pub fn block_transaction_hashes(block: &Block) -> Vec<Hash> {
    let mut hashes = Vec::with_capacity(block.transaction_hashes.len() + 1);
    hashes.push(transaction_hash(&block.base_transaction));
    hashes.extend_from_slice(&block.transaction_hashes);
    hashes
}

/// HashingBlob: ℬ → 𝔹*
pub fn hashing_blob(block: &Block) -> Vec<u8> {
    let header = &block.header;
    let mut writer = BinaryWriter::new();
    writer.write_varint(u64::from(header.major_version));
    writer.write_varint(u64::from(header.minor_version));
    if header.major_version == BLOCK_MAJOR_VERSION_1 {
        writer.write_varint(header.timestamp);
        writer.write_bytes(&header.previous_block_hash);
        writer.write_u32_le(header.nonce);
    } else {
        writer.write_bytes(&header.previous_block_hash);
    }
    let hashes = block_transaction_hashes(block);
    writer.write_bytes(&tree_hash(&hashes));
    writer.write_varint(hashes.len() as u64);
    writer.into_bytes()
}

/// ParentHashingBlob: ℬ → 𝔹*
///
/// Parent versions, the block timestamp, parent previous hash, the block
/// nonce, the parent transaction root rebuilt from the coinbase branch and the
/// parent transaction count.
pub fn parent_hashing_blob(block: &Block) -> Vec<u8> {
    let parent = &block.parent_block;
    let base_hash = transaction_hash(&parent.base_transaction);
    let root = tree_hash_from_branch(&parent.base_transaction_branch, &base_hash, None);

    let mut writer = BinaryWriter::new();
    writer.write_varint(u64::from(parent.major_version));
    writer.write_varint(u64::from(parent.minor_version));
    writer.write_varint(block.header.timestamp);
    writer.write_bytes(&parent.previous_block_hash);
    writer.write_u32_le(block.header.nonce);
    writer.write_bytes(&root);
    writer.write_varint(u64::from(parent.transaction_count));
    writer.into_bytes()
}

/// BlockId: ℬ → ℍ
pub fn block_id(block: &Block) -> Hash {
    let mut blob = hashing_blob(block);
    if block.header.major_version != BLOCK_MAJOR_VERSION_1 {
        blob.extend_from_slice(&parent_hashing_blob(block));
    }
    fast_hash(&blob)
}

/// Commitment a merge-mined parent block carries for this block
pub fn auxiliary_block_hash(block: &Block) -> Hash {
    fast_hash(&hashing_blob(block))
}

/// Bytes hashed by the proof of work
pub fn proof_of_work_blob(block: &Block) -> Vec<u8> {
    if block.header.major_version == BLOCK_MAJOR_VERSION_1 {
        hashing_blob(block)
    } else {
        parent_hashing_blob(block)
    }
}

/// Offset of the 4-byte nonce inside [`proof_of_work_blob`]
pub fn proof_of_work_nonce_offset(block: &Block) -> usize {
    let header = &block.header;
    if header.major_version == BLOCK_MAJOR_VERSION_1 {
        varint_size(u64::from(header.major_version))
            + varint_size(u64::from(header.minor_version))
            + varint_size(header.timestamp)
            + 32
    } else {
        let parent = &block.parent_block;
        varint_size(u64::from(parent.major_version))
            + varint_size(u64::from(parent.minor_version))
            + varint_size(header.timestamp)
            + 32
    }
}

/// PowHash: ℬ → ℍ
pub fn proof_of_work_hash(block: &Block) -> Hash {
    pow_hash(&proof_of_work_blob(block))
}

/// Height declared by the coinbase, if it starts with a height-binding input
pub fn declared_height(block: &Block) -> Option<BlockHeight> {
    match block.base_transaction.inputs.first() {
        Some(TransactionInput::Base(base)) => Some(base.block_index),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(major_version: u8) -> Block {
        Block {
            header: BlockHeader {
                major_version,
                minor_version: 0,
                timestamp: 1_338_224_400,
                previous_block_hash: [1; 32],
                nonce: 42,
            },
            parent_block: ParentBlock {
                major_version: 1,
                transaction_count: 1,
                ..Default::default()
            },
            base_transaction: Transaction {
                version: 1,
                unlock_time: 10,
                inputs: vec![TransactionInput::Base(BaseInput { block_index: 0 })],
                ..Default::default()
            },
            transaction_hashes: vec![],
        }
    }

    #[test]
    fn test_nonce_offset_points_at_nonce() {
        for version in [1u8, 2] {
            let mut b = block(version);
            b.header.nonce = 0x0403_0201;
            let blob = proof_of_work_blob(&b);
            let offset = proof_of_work_nonce_offset(&b);
            assert_eq!(&blob[offset..offset + 4], &[1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_v1_id_depends_on_nonce() {
        let a = block(1);
        let mut b = block(1);
        b.header.nonce += 1;
        assert_ne!(block_id(&a), block_id(&b));
    }

    #[test]
    fn test_v2_aux_hash_ignores_timestamp_and_nonce() {
        let a = block(2);
        let mut b = block(2);
        b.header.nonce += 1;
        b.header.timestamp += 1;
        assert_eq!(auxiliary_block_hash(&a), auxiliary_block_hash(&b));
        assert_ne!(block_id(&a), block_id(&b));
        assert_ne!(proof_of_work_hash(&a), proof_of_work_hash(&b));
    }

    #[test]
    fn test_transaction_list_changes_id() {
        let a = block(1);
        let mut b = block(1);
        b.transaction_hashes.push([9; 32]);
        assert_ne!(block_id(&a), block_id(&b));
    }

    #[test]
    fn test_declared_height() {
        assert_eq!(declared_height(&block(1)), Some(0));
        let mut b = block(1);
        b.base_transaction.inputs.clear();
        assert_eq!(declared_height(&b), None);
    }
}
