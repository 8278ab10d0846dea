//! Merge-mined (version 2) blocks: parent block size ceiling and the
//! merge-mining tag carried by the parent coinbase

mod common;

use common::*;
use consensus_core::block::{auxiliary_block_hash, block_id};
use consensus_core::crypto::tree_hash_from_branch;
use consensus_core::extra::{append_merge_mining_tag, append_nonce, MergeMiningTag};
use consensus_core::merge_mining::{adjust_parent_block_size, parent_block_size};
use consensus_core::*;
use proptest::prelude::*;

fn merge_mined_child() -> (Scenario, Block) {
    let mut s = Scenario::with_version(BLOCK_MAJOR_VERSION_2);
    let genesis = s.genesis.clone();
    let block = s.generator.next_block(&genesis, &s.miner).unwrap();
    (s, block)
}

#[test]
fn test_parent_block_at_ceiling_is_accepted() {
    let (mut s, block) = merge_mined_child();
    let limit = s.chain.currency().max_parent_block_size;

    let mut oversized = block.clone();
    adjust_parent_block_size(&mut oversized, limit + 1).unwrap();
    assert_eq!(parent_block_size(&oversized), limit + 1);
    assert_eq!(
        rejection(&s.submit(&oversized)),
        &RejectionReason::ParentBlockTooBig { size: limit + 1, limit }
    );

    let mut at_limit = block;
    adjust_parent_block_size(&mut at_limit, limit).unwrap();
    assert_eq!(parent_block_size(&at_limit), limit);
    assert_eq!(s.submit(&at_limit), BlockAcceptanceOutcome::AddedToMain);
}

#[test]
fn test_parent_coinbase_without_extra_is_rejected() {
    let (mut s, mut block) = merge_mined_child();
    block.parent_block.base_transaction.extra.clear();
    assert_eq!(rejection(&s.submit(&block)), &RejectionReason::MergeMiningTagMissing);
}

#[test]
fn test_parent_coinbase_with_nonce_only_is_rejected() {
    let (mut s, mut block) = merge_mined_child();
    let extra = &mut block.parent_block.base_transaction.extra;
    extra.clear();
    append_nonce(extra, b"not a merge mining tag");
    assert_eq!(rejection(&s.submit(&block)), &RejectionReason::MergeMiningTagMissing);
}

#[test]
fn test_garbage_after_tag_is_accepted() {
    let (mut s, mut block) = merge_mined_child();
    block
        .parent_block
        .base_transaction
        .extra
        .extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(s.submit(&block), BlockAcceptanceOutcome::AddedToMain);
}

#[test]
fn test_tag_committing_to_another_block_is_rejected() {
    let (mut s, mut block) = merge_mined_child();
    let extra = &mut block.parent_block.base_transaction.extra;
    extra.clear();
    append_merge_mining_tag(extra, &MergeMiningTag { depth: 0, merkle_root: [0x11; 32] });
    assert_eq!(rejection(&s.submit(&block)), &RejectionReason::AuxiliaryRootMismatch);
}

#[test]
fn test_coinbase_changed_after_commitment_is_rejected() {
    let (mut s, mut block) = merge_mined_child();
    block.base_transaction.extra.push(0);
    assert_eq!(rejection(&s.submit(&block)), &RejectionReason::AuxiliaryRootMismatch);

    reseal(&mut block);
    assert_eq!(s.submit(&block), BlockAcceptanceOutcome::AddedToMain);
}

#[test]
fn test_block_merge_mined_alongside_another_chain() {
    let (mut s, mut block) = merge_mined_child();
    let chain_id = block_id(&s.genesis);
    let sibling = [0x42; 32];
    let root = tree_hash_from_branch(&[sibling], &auxiliary_block_hash(&block), Some(&chain_id));

    block.parent_block.blockchain_branch = vec![sibling];
    let extra = &mut block.parent_block.base_transaction.extra;
    extra.clear();
    append_merge_mining_tag(extra, &MergeMiningTag { depth: 1, merkle_root: root });

    assert_eq!(s.submit(&block), BlockAcceptanceOutcome::AddedToMain);
}

#[test]
fn test_version_one_chain_ignores_parent_block() {
    let mut s = Scenario::with_version(BLOCK_MAJOR_VERSION_1);
    let genesis = s.genesis.clone();
    let block = s.generator.next_block(&genesis, &s.miner).unwrap();
    assert_eq!(block.parent_block, ParentBlock::default());
    assert_eq!(s.submit(&block), BlockAcceptanceOutcome::AddedToMain);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_parent_block_reaches_any_larger_size(grow in 0usize..3_000) {
        let (_, block) = merge_mined_child();
        let target = parent_block_size(&block) + grow;
        let mut adjusted = block.clone();
        prop_assert!(adjust_parent_block_size(&mut adjusted, target).is_ok());
        prop_assert_eq!(parent_block_size(&adjusted), target);
        prop_assert_eq!(&adjusted.base_transaction, &block.base_transaction);
    }
}
