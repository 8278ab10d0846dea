//! # Consensus-Core
//!
//! Consensus rules of a CryptoNote-style proof-of-work chain with merge
//! mining.
//!
//! This crate decides, for every candidate block, whether it extends the
//! chain, is already known, is an orphan, or must be rejected, and why.
//!
//! ## Architecture
//!
//! - Codec: canonical binary encoding of blocks and transactions
//! - Rules: pure functions for difficulty, header, merge mining, coinbase,
//!   block size and reward
//! - Acceptance: sequences the rules against a chain snapshot
//! - Blockchain: in-memory main chain applying accepted blocks
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: rule checks are deterministic and side-effect-free
//! 2. **Total Decoding**: every byte string decodes or yields a [`DecodeError`]
//! 3. **Exact Version Pinning**: consensus-critical dependencies are pinned
//! 4. **Closed Outcomes**: each submitted block yields exactly one
//!    [`BlockAcceptanceOutcome`]
//!
//! ## Usage
//!
//! ```rust
//! use consensus_core::ConsensusCore;
//!
//! let core = ConsensusCore::new();
//! assert_eq!(core.next_difficulty(&[1_338_224_400], &[1]), 1);
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod outcome;
pub mod serialization;
pub mod crypto;
pub mod extra;
pub mod currency;
pub mod upgrade;
pub mod economic;
pub mod difficulty;
pub mod pow;
pub mod block;
pub mod merge_mining;
pub mod header;
pub mod coinbase;
pub mod transaction;
pub mod block_size;
pub mod acceptance;
pub mod blockchain;
pub mod mining;
pub mod generator;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, DecodeError, Result};
pub use outcome::{BlockAcceptanceOutcome, CoinbaseError, RejectionReason, TransactionError};
pub use currency::{Currency, CurrencyBuilder};
pub use blockchain::Blockchain;

use economic::BlockReward;

/// Stateless entry point to the consensus rules of one currency
///
/// # Examples
///
/// ```
/// use consensus_core::{ConsensusCore, CurrencyBuilder};
///
/// let currency = CurrencyBuilder::new().difficulty_target(60).build().unwrap();
/// let core = ConsensusCore::with_currency(currency).unwrap();
/// assert_eq!(core.currency().difficulty_target, 60);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsensusCore {
    currency: Currency,
}

impl ConsensusCore {
    /// Create a consensus core with the reference currency
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_core::ConsensusCore;
    ///
    /// let core = ConsensusCore::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a consensus core for `currency`, refusing unusable policies
    pub fn with_currency(currency: Currency) -> Result<Self> {
        currency.validate()?;
        Ok(ConsensusCore { currency })
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Difficulty the next block must meet
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_core::ConsensusCore;
    ///
    /// let core = ConsensusCore::new();
    /// // Two blocks exactly one target apart, one unit of work
    /// assert_eq!(core.next_difficulty(&[0, 120], &[1, 2]), 1);
    /// ```
    pub fn next_difficulty(&self, timestamps: &[u64], cumulative_difficulties: &[Difficulty]) -> Difficulty {
        difficulty::next_difficulty(&self.currency, timestamps, cumulative_difficulties)
    }

    /// Check the proof of work of `block` against `difficulty`
    pub fn check_proof_of_work(&self, block: &Block, difficulty: Difficulty) -> bool {
        pow::check_proof_of_work(block, difficulty)
    }

    /// Reward of a block, `None` if it is more than twice the median size
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_core::ConsensusCore;
    ///
    /// let core = ConsensusCore::new();
    /// let reward = core.block_reward(1, 0, 100, 0, 0).unwrap();
    /// assert_eq!(reward.reward, u64::MAX >> 18);
    /// assert!(core.block_reward(1, 0, 40_001, 0, 0).is_none());
    /// ```
    pub fn block_reward(
        &self,
        major_version: u8,
        median_size: usize,
        block_size: usize,
        already_generated_coins: Amount,
        fee: Amount,
    ) -> Option<BlockReward> {
        economic::block_reward(&self.currency, major_version, median_size, block_size, already_generated_coins, fee)
    }

    /// Structural coinbase checks; returns the coinbase output sum
    pub fn validate_coinbase(
        &self,
        tx: &Transaction,
        height: BlockHeight,
        block_timestamp: u64,
    ) -> std::result::Result<Amount, CoinbaseError> {
        coinbase::validate_coinbase(&self.currency, tx, height, block_timestamp)
    }

    /// Largest cumulative size a block at `height` may have
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_core::ConsensusCore;
    ///
    /// let core = ConsensusCore::new();
    /// assert_eq!(core.block_size_ceiling(1, &[]), 20 * 1024);
    /// ```
    pub fn block_size_ceiling(&self, height: BlockHeight, recent_sizes: &[usize]) -> usize {
        block_size::block_size_ceiling(&self.currency, height, recent_sizes)
    }

    /// Merge-mining checks of a version ≥ 2 block for the chain `chain_id`
    pub fn check_merge_mining(&self, block: &Block, chain_id: &Hash) -> std::result::Result<(), RejectionReason> {
        merge_mining::check_merge_mining(&self.currency, block, chain_id)
    }

    /// Decode a serialized block
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_core::ConsensusCore;
    /// use consensus_core::types::*;
    ///
    /// let core = ConsensusCore::new();
    /// let block = Block {
    ///     header: BlockHeader { major_version: 1, timestamp: 1_338_224_400, ..Default::default() },
    ///     base_transaction: Transaction { version: 1, ..Default::default() },
    ///     ..Default::default()
    /// };
    /// let bytes = core.encode_block(&block);
    /// assert_eq!(core.decode_block(&bytes).unwrap(), block);
    /// assert!(core.decode_block(&bytes[..bytes.len() - 1]).is_err());
    /// ```
    pub fn decode_block(&self, bytes: &[u8]) -> std::result::Result<Block, DecodeError> {
        serialization::deserialize_block(bytes)
    }

    pub fn encode_block(&self, block: &Block) -> Vec<u8> {
        serialization::serialize_block(block)
    }

    /// Identifier of `block`
    pub fn block_id(&self, block: &Block) -> Hash {
        block::block_id(block)
    }
}
