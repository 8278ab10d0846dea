//! Shared fixtures for the integration tests

#![allow(dead_code)]

use consensus_core::generator::{Account, Generator};
use consensus_core::merge_mining::attach_parent_block;
use consensus_core::serialization::serialize_block;
use consensus_core::upgrade::UpgradeSchedule;
use consensus_core::*;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: Once = Once::new();

pub fn install_tracing() {
    LOGGER_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    })
}

/// Wall clock used for every submission, one hour past genesis
pub const NOW: u64 = GENESIS_TIMESTAMP + 3600;

pub fn schedule_for(major_version: u8) -> UpgradeSchedule {
    match major_version {
        BLOCK_MAJOR_VERSION_1 => UpgradeSchedule::v1_only(),
        BLOCK_MAJOR_VERSION_2 => UpgradeSchedule::v2_from_start(),
        _ => UpgradeSchedule::v3_from_start(),
    }
}

/// A chain and a generator that agree on genesis
pub struct Scenario {
    pub generator: Generator,
    pub chain: Blockchain,
    pub miner: Account,
    pub genesis: Block,
}

impl Scenario {
    pub fn new(currency: Currency, schedule: UpgradeSchedule) -> Self {
        install_tracing();
        let miner = Account::from_seed(b"miner");
        let mut generator = Generator::new(currency.clone(), schedule);
        let genesis = generator.genesis(&miner, GENESIS_TIMESTAMP).expect("genesis");
        let chain = Blockchain::new(currency, schedule, genesis.clone()).expect("chain");
        Scenario { generator, chain, miner, genesis }
    }

    pub fn with_version(major_version: u8) -> Self {
        Self::new(Currency::default(), schedule_for(major_version))
    }

    pub fn submit(&mut self, block: &Block) -> BlockAcceptanceOutcome {
        self.chain.add_block_at(&serialize_block(block), NOW)
    }

    /// Generate a default child of `parent` and require it to be accepted
    pub fn extend(&mut self, parent: &Block) -> Block {
        let block = self.generator.next_block(parent, &self.miner).expect("block");
        assert_eq!(self.submit(&block), BlockAcceptanceOutcome::AddedToMain);
        block
    }

    /// Generate and accept `count` default blocks on `parent`
    pub fn rewind(&mut self, parent: &Block, count: usize) -> Block {
        let mut last = parent.clone();
        for _ in 0..count {
            last = self.extend(&last);
        }
        last
    }
}

/// Recommit the parent block after the coinbase or transaction list of a
/// version ≥ 2 block changed. Only valid while difficulty is 1.
pub fn reseal(block: &mut Block) {
    if block.header.major_version >= BLOCK_MAJOR_VERSION_2 {
        let height = block::declared_height(block).unwrap_or(0);
        attach_parent_block(block, height);
    }
}

pub fn rejection(outcome: &BlockAcceptanceOutcome) -> &RejectionReason {
    outcome
        .rejection_reason()
        .unwrap_or_else(|| panic!("expected a rejection, got {:?}", outcome))
}
