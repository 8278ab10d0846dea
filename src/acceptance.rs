//! Block acceptance state machine
//!
//! Sequences the codec and the validators for one submitted block and yields
//! exactly one terminal decision. Evaluation is a pure function of the chain
//! snapshot it is given; applying an accepted block is left to the chain.
//!
//! Order of checks:
//! 1. decode (block, then any attached transactions)
//! 2. duplicate id → AlreadyExists
//! 3. parent lookup → Rejected(UnknownParent)
//! 4. version, timestamp
//! 5. merge mining (version ≥ 2)
//! 6. proof of work
//! 7. coinbase structure, height, unlock time, outputs
//! 8. transactions
//! 9. cumulative size
//! 10. coinbase reward
//!
//! A block whose parent is known but is not the tip goes through the same
//! checks against the main chain as it stood at that parent, except the
//! transaction inputs, and ends as RejectedAsOrphaned when they pass.

use crate::block::{block_id, transaction_hash};
use crate::block_size::{check_block_size, cumulative_block_size, effective_median_size};
use crate::coinbase::{check_coinbase_reward, validate_coinbase};
use crate::crypto::SignatureScheme;
use crate::currency::Currency;
use crate::difficulty::next_difficulty;
use crate::economic::block_reward;
use crate::header::{validate_header, validate_proof_of_work};
use crate::merge_mining::check_merge_mining;
use crate::outcome::{BlockAcceptanceOutcome, RejectionReason, TransactionError};
use crate::serialization::{deserialize_block, deserialize_transaction};
use crate::transaction::{check_transaction, check_transaction_inputs, OutputSource};
use crate::types::*;
use crate::upgrade::UpgradePolicy;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Chain/storage collaborator as seen by validation
pub trait ChainState: OutputSource {
    fn tip_height(&self) -> BlockHeight;

    fn tip_hash(&self) -> Hash;

    fn block_at(&self, height: BlockHeight) -> Option<BlockHeader>;

    fn is_known(&self, hash: &Hash) -> bool;

    fn pool_transaction_count(&self) -> usize;

    /// Main-chain height of the block with id `hash`
    fn height_of(&self, hash: &Hash) -> Option<BlockHeight>;

    /// Bookkeeping of the main-chain block at `height`
    fn block_info(&self, height: BlockHeight) -> Option<BlockInfo>;

    fn pool_transaction(&self, hash: &Hash) -> Option<Transaction>;

    /// Id of the genesis block, which doubles as the merge-mining chain id
    fn genesis_hash(&self) -> Hash {
        self.block_info(0).map(|info| info.hash).unwrap_or([0u8; 32])
    }
}

/// Snapshot of everything a candidate block at `height` is checked against
pub struct ValidationContext<'a> {
    pub currency: &'a Currency,
    pub upgrades: &'a dyn UpgradePolicy,
    pub height: BlockHeight,
    pub parent_hash: Hash,
    pub extends_tip: bool,
    pub chain_id: Hash,
    pub recent_timestamps: Vec<u64>,
    pub difficulty_window: DifficultyWindow,
    pub difficulty: Difficulty,
    pub recent_sizes: Vec<usize>,
    pub already_generated_coins: Amount,
    pub now: u64,
}

impl<'a> ValidationContext<'a> {
    /// Build the context for a child of the main-chain block at
    /// `parent_height`. `None` if the chain has no block there.
    pub fn at_parent<C: ChainState + ?Sized>(
        chain: &C,
        currency: &'a Currency,
        upgrades: &'a dyn UpgradePolicy,
        parent_height: BlockHeight,
        now: u64,
    ) -> Option<Self> {
        let parent = chain.block_info(parent_height)?;
        let height = parent_height.checked_add(1)?;

        let trailing = |count: usize| -> Option<Vec<BlockInfo>> {
            let first = u64::from(height).saturating_sub(count as u64) as BlockHeight;
            (first..height).map(|h| chain.block_info(h)).collect()
        };

        let recent_timestamps = trailing(currency.timestamp_check_window)?
            .iter()
            .map(|info| info.timestamp)
            .collect();

        let mut difficulty_window = DifficultyWindow::new(currency.difficulty_window);
        for info in trailing(currency.difficulty_window)? {
            difficulty_window.push(info.timestamp, info.cumulative_difficulty);
        }
        let (timestamps, cumulative_difficulties) = difficulty_window.as_slices();
        let difficulty = next_difficulty(currency, timestamps, cumulative_difficulties);

        let recent_sizes = trailing(currency.reward_blocks_window)?
            .iter()
            .map(|info| info.size)
            .collect();

        Some(ValidationContext {
            currency,
            upgrades,
            height,
            parent_hash: parent.hash,
            extends_tip: parent.hash == chain.tip_hash(),
            chain_id: chain.genesis_hash(),
            recent_timestamps,
            difficulty_window,
            difficulty,
            recent_sizes,
            already_generated_coins: parent.already_generated_coins,
            now,
        })
    }

    pub fn median_block_size(&self) -> usize {
        effective_median_size(self.currency, &self.recent_sizes)
    }
}

/// A block that passed every rule and may be appended to the main chain
#[derive(Debug, Clone)]
pub struct ValidatedBlock {
    pub block: Block,
    pub id: Hash,
    pub height: BlockHeight,
    pub difficulty: Difficulty,
    pub size: usize,
    pub transactions: Vec<Transaction>,
    pub reward: Amount,
    pub emission_change: i64,
}

/// Terminal decision for a submitted block
#[derive(Debug, Clone)]
pub enum BlockDecision {
    /// Extends the tip and passed every rule; the chain should append it
    Accept(Box<ValidatedBlock>),
    /// Any other outcome; nothing to apply
    Outcome(BlockAcceptanceOutcome),
}

impl BlockDecision {
    pub fn outcome(&self) -> BlockAcceptanceOutcome {
        match self {
            BlockDecision::Accept(_) => BlockAcceptanceOutcome::AddedToMain,
            BlockDecision::Outcome(outcome) => outcome.clone(),
        }
    }
}

type CheckResult<T> = std::result::Result<T, RejectionReason>;

/// Evaluate a serialized block (and optional serialized transactions) against
/// `chain`.
#[instrument(skip_all, fields(block_len = raw.block.len()))]
pub fn evaluate_raw_block<C, S>(
    chain: &C,
    currency: &Currency,
    upgrades: &dyn UpgradePolicy,
    scheme: &S,
    raw: &RawBlock,
    now: u64,
) -> BlockDecision
where
    C: ChainState + ?Sized,
    S: SignatureScheme + ?Sized,
{
    let block = match deserialize_block(&raw.block) {
        Ok(block) => block,
        Err(e) => {
            debug!(error = %e, "block failed to decode");
            return BlockDecision::Outcome(BlockAcceptanceOutcome::Rejected(RejectionReason::Decode(e)));
        }
    };

    let mut attached = HashMap::with_capacity(raw.transactions.len());
    for blob in &raw.transactions {
        match deserialize_transaction(blob) {
            Ok(tx) => {
                attached.insert(transaction_hash(&tx), tx);
            }
            Err(e) => {
                debug!(error = %e, "attached transaction failed to decode");
                return BlockDecision::Outcome(BlockAcceptanceOutcome::Rejected(RejectionReason::Decode(e)));
            }
        }
    }

    evaluate_block(chain, currency, upgrades, scheme, block, &attached, now)
}

/// Evaluate a decoded block. Transactions are looked up first in `attached`,
/// then in the chain's pool.
pub fn evaluate_block<C, S>(
    chain: &C,
    currency: &Currency,
    upgrades: &dyn UpgradePolicy,
    scheme: &S,
    block: Block,
    attached: &HashMap<Hash, Transaction>,
    now: u64,
) -> BlockDecision
where
    C: ChainState + ?Sized,
    S: SignatureScheme + ?Sized,
{
    let id = block_id(&block);
    if chain.is_known(&id) {
        debug!(id = ?id, "block already known");
        return BlockDecision::Outcome(BlockAcceptanceOutcome::AlreadyExists);
    }

    let Some(parent_height) = chain.height_of(&block.header.previous_block_hash) else {
        warn!(prev = ?block.header.previous_block_hash, "previous block unknown");
        return BlockDecision::Outcome(BlockAcceptanceOutcome::Rejected(RejectionReason::UnknownParent));
    };
    let Some(ctx) = ValidationContext::at_parent(chain, currency, upgrades, parent_height, now) else {
        warn!(parent_height, "chain has no history for parent");
        return BlockDecision::Outcome(BlockAcceptanceOutcome::Rejected(RejectionReason::UnknownParent));
    };

    match validate_block(&ctx, chain, scheme, block, id, attached) {
        Err(reason) => {
            warn!(height = ctx.height, %reason, "block rejected");
            BlockDecision::Outcome(BlockAcceptanceOutcome::Rejected(reason))
        }
        Ok(_) if !ctx.extends_tip => {
            debug!(height = ctx.height, "block does not extend the tip");
            BlockDecision::Outcome(BlockAcceptanceOutcome::RejectedAsOrphaned)
        }
        Ok(validated) => {
            info!(height = validated.height, difficulty = validated.difficulty, size = validated.size, "block accepted");
            BlockDecision::Accept(Box::new(validated))
        }
    }
}

/// Apply every block rule against `ctx`
pub fn validate_block<C, S>(
    ctx: &ValidationContext<'_>,
    chain: &C,
    scheme: &S,
    block: Block,
    id: Hash,
    attached: &HashMap<Hash, Transaction>,
) -> CheckResult<ValidatedBlock>
where
    C: ChainState + ?Sized,
    S: SignatureScheme + ?Sized,
{
    let currency = ctx.currency;

    validate_header(ctx, &block)?;
    check_merge_mining(currency, &block, &ctx.chain_id)?;
    validate_proof_of_work(ctx, &block)?;

    let coinbase_sum = validate_coinbase(currency, &block.base_transaction, ctx.height, block.header.timestamp)?;

    let transactions = resolve_transactions(chain, &block, attached)?;
    let fees = check_block_transactions(ctx, chain, scheme, &transactions)?;

    let size = cumulative_block_size(&block, &transactions);
    check_block_size(currency, ctx.height, &ctx.recent_sizes, size)?;

    let limit = 2 * ctx.median_block_size();
    let reward = block_reward(
        currency,
        block.header.major_version,
        ctx.median_block_size(),
        size,
        ctx.already_generated_coins,
        fees,
    )
    .ok_or(RejectionReason::CumulativeSizeTooBig { size, limit })?;
    check_coinbase_reward(coinbase_sum, reward.reward)?;

    Ok(ValidatedBlock {
        block,
        id,
        height: ctx.height,
        difficulty: ctx.difficulty,
        size,
        transactions,
        reward: reward.reward,
        emission_change: reward.emission_change,
    })
}

fn resolve_transactions<C: ChainState + ?Sized>(
    chain: &C,
    block: &Block,
    attached: &HashMap<Hash, Transaction>,
) -> CheckResult<Vec<Transaction>> {
    let mut seen = HashSet::with_capacity(block.transaction_hashes.len());
    let mut transactions = Vec::with_capacity(block.transaction_hashes.len());
    for hash in &block.transaction_hashes {
        if !seen.insert(*hash) {
            return Err(RejectionReason::DuplicateTransaction { hash: *hash });
        }
        let tx = attached
            .get(hash)
            .cloned()
            .or_else(|| chain.pool_transaction(hash))
            .ok_or(RejectionReason::TransactionNotFound { hash: *hash })?;
        transactions.push(tx);
    }
    Ok(transactions)
}

/// Check every transaction and return the total fee. Inputs are only checked
/// against chain state when the block extends the tip.
fn check_block_transactions<C, S>(
    ctx: &ValidationContext<'_>,
    chain: &C,
    scheme: &S,
    transactions: &[Transaction],
) -> CheckResult<Amount>
where
    C: ChainState + ?Sized,
    S: SignatureScheme + ?Sized,
{
    let mut fees: Amount = 0;
    let mut key_images = HashSet::new();
    for (index, tx) in transactions.iter().enumerate() {
        let reject = |error: TransactionError| RejectionReason::Transaction { index, error };

        let fee = check_transaction(tx).map_err(reject)?;
        for input in tx.key_inputs() {
            if !key_images.insert(input.key_image) {
                return Err(reject(TransactionError::DuplicateKeyImage(input.key_image)));
            }
        }
        if ctx.extends_tip {
            check_transaction_inputs(ctx.currency, tx, chain, scheme, ctx.height, ctx.now).map_err(reject)?;
        }
        fees = fees.checked_add(fee).ok_or_else(|| reject(TransactionError::InputOverflow))?;
    }
    Ok(fees)
}
