//! Currency policy loading and validation

mod common;

use common::*;
use consensus_core::*;

#[test]
fn test_reference_policy_matches_constants() {
    let currency = Currency::default();
    assert_eq!(currency.difficulty_target, DIFFICULTY_TARGET);
    assert_eq!(currency.difficulty_window, DIFFICULTY_WINDOW);
    assert_eq!(currency.mined_money_unlock_window, MINED_MONEY_UNLOCK_WINDOW);
    assert_eq!(currency.max_parent_block_size, MAX_PARENT_BLOCK_SIZE);
    assert_eq!(currency.genesis_timestamp, GENESIS_TIMESTAMP);
    assert!(currency.validate().is_ok());
}

#[test]
fn test_json_roundtrip_keeps_every_field() {
    let currency = CurrencyBuilder::new()
        .money_supply(1 << 40)
        .difficulty_target(60)
        .difficulty_window(100)
        .difficulty_cut(10)
        .timestamp_check_window(30)
        .block_future_time_limit(600)
        .mined_money_unlock_window(20)
        .max_block_size_growth(1, 2)
        .max_parent_block_size(4096)
        .build()
        .unwrap();
    let json = currency.to_json().unwrap();
    assert_eq!(Currency::from_json(&json).unwrap(), currency);
}

#[test]
fn test_partial_json_takes_reference_values() {
    let currency = Currency::from_json(r#"{ "max_parent_block_size": 1024 }"#).unwrap();
    assert_eq!(currency.max_parent_block_size, 1024);
    assert_eq!(Currency { max_parent_block_size: MAX_PARENT_BLOCK_SIZE, ..currency }, Currency::default());
}

#[test]
fn test_unusable_policies_are_refused() {
    let cases = [
        r#"{ "difficulty_target": 0 }"#,
        r#"{ "difficulty_window": 1 }"#,
        r#"{ "difficulty_window": 20, "difficulty_cut": 10, "mined_money_unlock_window": 5 }"#,
        r#"{ "max_block_size_growth_speed_denominator": 0 }"#,
        r#"{ "difficulty_window": 10, "difficulty_cut": 0 }"#,
        r#"{ "emission_speed_factor": 0 }"#,
        r#"{ "reward_blocks_window": 0 }"#,
        r#"{ "difficulty_target": "fast" }"#,
    ];
    for json in cases {
        assert!(
            matches!(Currency::from_json(json), Err(ConsensusError::Configuration(_))),
            "{} was accepted",
            json
        );
    }
}

#[test]
fn test_chain_and_facade_refuse_unusable_policy() {
    let currency = Currency { difficulty_target: 0, ..Currency::default() };
    assert!(ConsensusCore::with_currency(currency.clone()).is_err());

    let genesis = Scenario::with_version(BLOCK_MAJOR_VERSION_1).genesis;
    assert!(Blockchain::new(currency, schedule_for(BLOCK_MAJOR_VERSION_1), genesis).is_err());
}

#[test]
fn test_custom_policy_drives_the_chain() {
    let currency = Currency::from_json(r#"{ "difficulty_target": 60, "mined_money_unlock_window": 3 }"#).unwrap();
    let mut s = Scenario::new(currency, schedule_for(BLOCK_MAJOR_VERSION_2));
    let genesis = s.genesis.clone();
    let tip = s.rewind(&genesis, 4);
    assert_eq!(tip.header.timestamp, GENESIS_TIMESTAMP + 4 * 60);
    assert_eq!(tip.base_transaction.unlock_time, 4 + 3);
    assert_eq!(s.chain.next_difficulty(), 1);
}
