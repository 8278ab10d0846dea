//! Consensus constants of the reference currency policy

use crate::types::Hash;

/// All-zero digest, used as the genesis previous-block sentinel
pub const NULL_HASH: Hash = [0u8; 32];

/// Supported block major versions
pub const BLOCK_MAJOR_VERSION_1: u8 = 1;
pub const BLOCK_MAJOR_VERSION_2: u8 = 2;
pub const BLOCK_MAJOR_VERSION_3: u8 = 3;

/// Minor version produced by the reference miner
pub const BLOCK_MINOR_VERSION_0: u8 = 0;

/// Transaction version produced by the reference wallet
pub const CURRENT_TRANSACTION_VERSION: u8 = 1;

/// Unlock times below this value are block heights, above it UNIX timestamps
pub const MAX_BLOCK_NUMBER: u64 = 500_000_000;

/// Total money supply in atomic units
pub const MONEY_SUPPLY: u64 = u64::MAX;

/// Emission speed: base reward = (supply - generated) >> EMISSION_SPEED_FACTOR
pub const EMISSION_SPEED_FACTOR: u32 = 18;

/// Target time between blocks in seconds
pub const DIFFICULTY_TARGET: u64 = 120;

/// Number of blocks in the difficulty window
pub const DIFFICULTY_WINDOW: usize = 720;

/// Timestamps trimmed from each end of the sorted difficulty window
pub const DIFFICULTY_CUT: usize = 60;

/// Number of trailing blocks whose median bounds the next timestamp
pub const TIMESTAMP_CHECK_WINDOW: usize = 60;

/// Maximum distance of a block timestamp into the future, seconds
pub const BLOCK_FUTURE_TIME_LIMIT: u64 = 60 * 60 * 2;

/// Blocks a coinbase output stays locked
pub const MINED_MONEY_UNLOCK_WINDOW: u32 = 10;

/// Blocks whose sizes feed the reward median
pub const REWARD_BLOCKS_WINDOW: usize = 100;

/// Block size below which the full reward is granted
pub const BLOCK_GRANTED_FULL_REWARD_ZONE: usize = 20_000;

/// Space reserved for the coinbase when a miner fills a block
pub const MINER_TX_BLOB_RESERVED_SIZE: usize = 600;

/// Floor of the cumulative block size ceiling
pub const MAX_BLOCK_SIZE_INITIAL: usize = 20 * 1024;

/// Ceiling growth: numerator bytes per denominator blocks
pub const MAX_BLOCK_SIZE_GROWTH_SPEED_NUMERATOR: u64 = 100 * 1024;
pub const MAX_BLOCK_SIZE_GROWTH_SPEED_DENOMINATOR: u64 = 365 * 24 * 60 * 60 / DIFFICULTY_TARGET;

/// Amounts below this value are exempt from the canonical denomination rule
pub const DEFAULT_DUST_THRESHOLD: u64 = 1_000_000;

/// Ceiling on the serialized size of a merge-mining parent block
pub const MAX_PARENT_BLOCK_SIZE: usize = 2 * 1024;

/// Deepest auxiliary-chain Merkle branch accepted in a merge-mining tag
pub const MAX_MERGE_MINING_DEPTH: u64 = 8 * 32;

/// Tolerances used when deciding whether a referenced output is spendable
pub const LOCKED_TX_ALLOWED_DELTA_BLOCKS: u32 = 1;
pub const LOCKED_TX_ALLOWED_DELTA_SECONDS: u64 = DIFFICULTY_TARGET * LOCKED_TX_ALLOWED_DELTA_BLOCKS as u64;

/// Genesis block timestamp of the reference currency
pub const GENESIS_TIMESTAMP: u64 = 1_338_224_400;

/// Minimum difficulty, returned for an empty or degenerate window
pub const MIN_DIFFICULTY: u64 = 1;
