//! Codec robustness: truncated, padded, corrupted and random inputs

mod common;

use common::*;
use consensus_core::block::transaction_hash;
use consensus_core::generator::{construct_transaction, BlockBuilder, OutputSourceEntry};
use consensus_core::serialization::*;
use consensus_core::*;
use proptest::prelude::*;

const VERSIONS: [u8; 3] = [BLOCK_MAJOR_VERSION_1, BLOCK_MAJOR_VERSION_2, BLOCK_MAJOR_VERSION_3];

/// Difficulty above which a corrupted block passing proof of work by chance
/// is not a practical concern
const CORRUPTION_DIFFICULTY: Difficulty = 1 << 18;

#[test]
fn test_generated_blocks_roundtrip() {
    for version in VERSIONS {
        let mut s = Scenario::with_version(version);
        let genesis = s.genesis.clone();
        let tip = s.rewind(&genesis, 2);
        let bytes = serialize_block(&tip);
        assert_eq!(deserialize_block(&bytes).unwrap(), tip);
        assert_eq!(s.chain.tip().block, tip);
    }
}

#[test]
fn test_every_truncation_fails_to_decode() {
    for version in VERSIONS {
        let mut s = Scenario::with_version(version);
        let genesis = s.genesis.clone();
        let block = s.extend(&genesis);
        let bytes = serialize_block(&block);
        for len in 0..bytes.len() {
            assert!(deserialize_block(&bytes[..len]).is_err(), "prefix of {} bytes decoded", len);
        }
    }
}

#[test]
fn test_trailing_byte_is_rejected() {
    for version in VERSIONS {
        let mut s = Scenario::with_version(version);
        let genesis = s.genesis.clone();
        let block = s.generator.next_block(&genesis, &s.miner).unwrap();
        let mut bytes = serialize_block(&block);
        bytes.push(0);
        assert_eq!(deserialize_block(&bytes), Err(DecodeError::TrailingBytes(1)));
        assert_eq!(
            s.chain.add_block_at(&bytes, NOW),
            BlockAcceptanceOutcome::Rejected(RejectionReason::Decode(DecodeError::TrailingBytes(1)))
        );
    }
}

#[test]
fn test_malformed_attached_transaction_is_rejected() {
    let mut s = Scenario::with_version(BLOCK_MAJOR_VERSION_1);
    let genesis = s.genesis.clone();
    let block = s.generator.next_block(&genesis, &s.miner).unwrap();
    let raw = RawBlock { block: serialize_block(&block), transactions: vec![vec![0x01]] };
    assert!(matches!(
        s.chain.add_raw_block_at(&raw, NOW),
        BlockAcceptanceOutcome::Rejected(RejectionReason::Decode(_))
    ));
    assert_eq!(s.chain.height(), 0);
}

/// Flip every bit of a block carrying a pooled transaction. No corrupted copy
/// may be added, and none may disturb the pool; the intact block is added
/// afterwards.
#[test]
fn test_corrupted_blocks_are_never_added() {
    for version in VERSIONS {
        let currency = CurrencyBuilder::new()
            .money_supply(1_000_000 << 18)
            .difficulty_target(1)
            .difficulty_window(20)
            .difficulty_cut(0)
            .build()
            .unwrap();
        let mut s = Scenario::new(currency, schedule_for(version));
        let genesis = s.genesis.clone();

        let mut parent = s.rewind(&genesis, 10);
        for _ in 0..200 {
            if s.chain.next_difficulty() >= CORRUPTION_DIFFICULTY {
                break;
            }
            let lifted = s.generator.lift_difficulty(&parent, &s.miner, 1).unwrap();
            assert_eq!(s.submit(&lifted[0]), BlockAcceptanceOutcome::AddedToMain);
            parent = lifted[0].clone();
        }
        assert!(s.chain.next_difficulty() >= CORRUPTION_DIFFICULTY);

        let coinbase = &genesis.base_transaction;
        let indices = s.chain.output_indices(&transaction_hash(coinbase)).unwrap();
        let source = OutputSourceEntry { transaction: coinbase, output_index: 0, global_index: indices[0] };
        let tx = construct_transaction(&s.miner, &source, &s.miner, 0, b"bit-flip").unwrap();
        s.chain.add_transaction_at(tx.clone(), NOW).unwrap();

        let block = s
            .generator
            .build(
                &parent,
                &s.miner,
                BlockBuilder::new()
                    .timestamp(parent.header.timestamp)
                    .transactions(std::slice::from_ref(&tx), 0),
            )
            .unwrap();
        let bytes = serialize_block(&block);
        let height = s.chain.height();

        for bit in 0..bytes.len() * 8 {
            let mut corrupted = bytes.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);
            let outcome = s.chain.add_block_at(&corrupted, NOW);
            assert!(!outcome.is_added(), "flipping bit {} produced an accepted block", bit);
        }
        assert_eq!(s.chain.height(), height);
        assert_eq!(s.chain.pool().count(), 1);

        assert_eq!(s.chain.add_block_at(&bytes, NOW), BlockAcceptanceOutcome::AddedToMain);
        assert_eq!(s.chain.pool().count(), 0);
        assert_eq!(s.chain.tip().transactions, vec![tx]);
        assert_eq!(s.chain.add_block_at(&bytes, NOW), BlockAcceptanceOutcome::AlreadyExists);
    }
}

proptest! {
    #[test]
    fn prop_random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = deserialize_block(&bytes);
        let _ = deserialize_transaction(&bytes);
    }

    #[test]
    fn prop_decoded_blocks_reencode_identically(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(block) = deserialize_block(&bytes) {
            prop_assert_eq!(serialize_block(&block), bytes);
        }
    }

    #[test]
    fn prop_varint_roundtrip(value in any::<u64>()) {
        let encoded = encode_varint(value);
        prop_assert_eq!(encoded.len(), varint_size(value));
        let mut reader = BinaryReader::new(&encoded);
        prop_assert_eq!(reader.read_varint().unwrap(), value);
        prop_assert_eq!(reader.remaining(), 0);
    }
}
