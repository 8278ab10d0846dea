//! Merge-mining parent block handling for version ≥ 2 blocks
//!
//! A version ≥ 2 block is proven by the proof of work of a parent block whose
//! coinbase `extra` carries a merge-mining tag. The tag commits to the
//! aggregate Merkle root of the auxiliary chains; this chain's leaf is the
//! auxiliary block hash and its position in the aggregate tree is selected by
//! the chain id (the genesis block id).

use crate::block::auxiliary_block_hash;
use crate::crypto::tree_hash_from_branch;
use crate::currency::Currency;
use crate::error::{ConsensusError, Result};
use crate::extra::{append_merge_mining_tag, find_merge_mining_tag, MergeMiningTag};
use crate::outcome::RejectionReason;
use crate::serialization::serialize_parent_block;
use crate::types::*;
use tracing::debug;

/// Serialized size of the full parent block section
pub fn parent_block_size(block: &Block) -> usize {
    serialize_parent_block(block).len()
}

/// ParentBlockSize ≤ ceiling
pub fn check_parent_block_size(currency: &Currency, block: &Block) -> std::result::Result<(), RejectionReason> {
    let size = parent_block_size(block);
    if size > currency.max_parent_block_size {
        return Err(RejectionReason::ParentBlockTooBig { size, limit: currency.max_parent_block_size });
    }
    Ok(())
}

/// Root of the auxiliary-chain tree this block proves it belongs to
pub fn auxiliary_merkle_root(block: &Block, chain_id: &Hash) -> Hash {
    tree_hash_from_branch(&block.parent_block.blockchain_branch, &auxiliary_block_hash(block), Some(chain_id))
}

/// CheckMergeMining: ℬ × ℍ → {valid, invalid}
///
/// 1. Parent block size must not exceed the ceiling
/// 2. Parent coinbase extra must carry a merge-mining tag
/// 3. Folding the auxiliary hash through the blockchain branch along the
///    chain id path must give the tag's root
///
/// Version 1 blocks pass trivially.
pub fn check_merge_mining(
    currency: &Currency,
    block: &Block,
    chain_id: &Hash,
) -> std::result::Result<(), RejectionReason> {
    if block.header.major_version < 2 {
        return Ok(());
    }

    check_parent_block_size(currency, block)?;

    let tag = find_merge_mining_tag(&block.parent_block.base_transaction.extra)
        .ok_or(RejectionReason::MergeMiningTagMissing)?;

    if block.parent_block.blockchain_branch.len() as u64 != tag.depth
        || auxiliary_merkle_root(block, chain_id) != tag.merkle_root
    {
        return Err(RejectionReason::AuxiliaryRootMismatch);
    }
    Ok(())
}

/// Give a version ≥ 2 block a single-chain parent block committing to it.
///
/// The parent coinbase carries a depth-0 tag whose root is the auxiliary
/// block hash, so the coinbase and transaction list must be final.
pub fn attach_parent_block(block: &mut Block, parent_height: BlockHeight) {
    let mut base_transaction = Transaction {
        version: 1,
        unlock_time: 0,
        inputs: vec![TransactionInput::Base(BaseInput { block_index: parent_height })],
        outputs: Vec::new(),
        extra: Vec::new(),
        signatures: Vec::new(),
    };
    let tag = MergeMiningTag { depth: 0, merkle_root: auxiliary_block_hash(block) };
    append_merge_mining_tag(&mut base_transaction.extra, &tag);

    block.parent_block = ParentBlock {
        major_version: 1,
        minor_version: 0,
        previous_block_hash: block.header.previous_block_hash,
        transaction_count: 1,
        base_transaction_branch: Vec::new(),
        base_transaction,
        blockchain_branch: Vec::new(),
    };
}

/// Resize the parent coinbase extra until the parent block serializes to
/// exactly `target_size` bytes.
///
/// Size is not linear in the extra length (its varint length prefix can grow),
/// so every adjustment is re-measured. When trimming lands one byte short the
/// block timestamp is widened by one varint byte.
pub fn adjust_parent_block_size(block: &mut Block, target_size: usize) -> Result<()> {
    let size = parent_block_size(block);
    if size > target_size {
        return Err(ConsensusError::BlockValidation(format!(
            "parent block size {} already exceeds target {}",
            size, target_size
        )));
    }

    let extra = &mut block.parent_block.base_transaction.extra;
    extra.resize(extra.len() + (target_size - size), 0);
    let mut size = parent_block_size(block);

    if size > target_size {
        let excess = size - target_size;
        let extra = &mut block.parent_block.base_transaction.extra;
        if extra.len() < excess {
            return Err(ConsensusError::BlockValidation(format!(
                "cannot trim parent block to {} bytes",
                target_size
            )));
        }
        extra.truncate(extra.len() - excess);
        size = parent_block_size(block);

        if size + 1 == target_size {
            block.header.timestamp = block.header.timestamp.max(1) << 7;
            size = parent_block_size(block);
        }
    }

    if size != target_size {
        return Err(ConsensusError::BlockValidation(format!(
            "parent block size {} instead of target {}",
            size, target_size
        )));
    }
    debug!(target_size, "adjusted parent block size");
    Ok(())
}
