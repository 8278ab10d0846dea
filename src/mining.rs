//! Miner transaction construction, block templates and nonce search

use crate::acceptance::{ChainState, ValidationContext};
use crate::block::{proof_of_work_blob, proof_of_work_nonce_offset, transaction_hash};
use crate::constants::{BLOCK_MINOR_VERSION_0, CURRENT_TRANSACTION_VERSION};
use crate::crypto::pow_hash;
use crate::currency::Currency;
use crate::economic::{block_reward, decompose_amount};
use crate::error::{ConsensusError, Result};
use crate::extra::{append_nonce, append_public_key, TX_EXTRA_TAG_PADDING};
use crate::merge_mining::attach_parent_block;
use crate::pow::check_hash;
use crate::serialization::transaction_size;
use crate::transaction::check_transaction;
use crate::types::*;
use crate::upgrade::UpgradePolicy;
use tracing::debug;

/// Attempts at reaching an exact miner transaction size before giving up
const SIZE_ADJUSTMENT_ROUNDS: usize = 16;

/// Inputs to the reward computation of a miner transaction
#[derive(Debug, Clone)]
pub struct MinerTxParams {
    pub major_version: u8,
    pub height: BlockHeight,
    pub median_size: usize,
    /// Cumulative size of the block the transaction will sit in
    pub current_block_size: usize,
    pub already_generated_coins: Amount,
    pub fee: Amount,
    pub tx_public_key: PublicKey,
    pub extra_nonce: Vec<u8>,
}

/// ConstructMinerTx: ℕ × ℕ × ℕ × ℕ → 𝒯𝒳
///
/// 1. reward = GetBlockReward(version, median, blockSize, generated, fee)
/// 2. outputs = Decompose(reward), one fresh key per output
/// 3. unlock = height + minedMoneyUnlockWindow
pub fn construct_miner_tx<F>(currency: &Currency, params: &MinerTxParams, output_key: F) -> Result<Transaction>
where
    F: FnMut(usize) -> PublicKey,
{
    construct_padded_miner_tx(currency, params, 0, output_key)
}

fn construct_padded_miner_tx<F>(
    currency: &Currency,
    params: &MinerTxParams,
    padding: usize,
    mut output_key: F,
) -> Result<Transaction>
where
    F: FnMut(usize) -> PublicKey,
{
    let reward = block_reward(
        currency,
        params.major_version,
        params.median_size,
        params.current_block_size,
        params.already_generated_coins,
        params.fee,
    )
    .ok_or_else(|| {
        ConsensusError::EconomicValidation(format!(
            "block size {} exceeds twice the median {}",
            params.current_block_size, params.median_size
        ))
    })?;

    let outputs = decompose_amount(reward.reward, currency.default_dust_threshold)
        .into_iter()
        .enumerate()
        .map(|(index, amount)| TransactionOutput { amount, key: output_key(index) })
        .collect();

    let mut extra = Vec::new();
    append_public_key(&mut extra, &params.tx_public_key);
    if !params.extra_nonce.is_empty() {
        append_nonce(&mut extra, &params.extra_nonce);
    }
    if padding > 0 {
        extra.push(TX_EXTRA_TAG_PADDING);
        extra.resize(extra.len() + padding - 1, 0);
    }

    Ok(Transaction {
        version: CURRENT_TRANSACTION_VERSION,
        unlock_time: currency.coinbase_unlock_time(params.height),
        inputs: vec![TransactionInput::Base(BaseInput { block_index: params.height })],
        outputs,
        extra,
        signatures: Vec::new(),
    })
}

/// Miner transaction serializing to exactly `target_size` bytes.
///
/// `params.current_block_size` must already account for the target size. The
/// extra field is padded and re-measured because its length prefix grows with
/// it; sizes straddling a length-prefix boundary may be unreachable.
pub fn construct_miner_tx_of_size<F>(
    currency: &Currency,
    params: &MinerTxParams,
    target_size: usize,
    mut output_key: F,
) -> Result<Transaction>
where
    F: FnMut(usize) -> PublicKey,
{
    let mut padding = 0usize;
    for _ in 0..SIZE_ADJUSTMENT_ROUNDS {
        let tx = construct_padded_miner_tx(currency, params, padding, &mut output_key)?;
        let size = transaction_size(&tx);
        if size == target_size {
            debug!(target_size, padding, "miner transaction sized");
            return Ok(tx);
        }
        if size < target_size {
            padding += target_size - size;
        } else {
            let excess = size - target_size;
            if padding < excess {
                break;
            }
            padding -= excess;
        }
    }
    Err(ConsensusError::EconomicValidation(format!(
        "cannot build a miner transaction of exactly {} bytes",
        target_size
    )))
}

// ============================================================================
// BLOCK TEMPLATES
// ============================================================================

/// BlockTemplate: Interface for mining software
///
/// A block on top of the current tip whose coinbase already claims the reward
/// for its final size. Only the nonce remains to be found.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub height: BlockHeight,
    pub difficulty: Difficulty,
    pub median_size: usize,
    pub cumulative_size: usize,
    pub already_generated_coins: Amount,
}

/// CreateNewBlock: 𝒞 × 𝒯𝒳* → ℬ
///
/// 1. Take difficulty, median size and emission from the tip
/// 2. Collect fees of the given transactions
/// 3. Size the coinbase until its reward matches the block's final size
/// 4. For version ≥ 2, attach a parent block committing to the result
pub fn create_block_template<C, F>(
    chain: &C,
    currency: &Currency,
    upgrades: &dyn UpgradePolicy,
    transactions: &[Transaction],
    timestamp: u64,
    tx_public_key: PublicKey,
    mut output_key: F,
) -> Result<BlockTemplate>
where
    C: ChainState + ?Sized,
    F: FnMut(usize) -> PublicKey,
{
    let ctx = ValidationContext::at_parent(chain, currency, upgrades, chain.tip_height(), timestamp)
        .ok_or_else(|| ConsensusError::BlockValidation("chain has no tip".to_string()))?;
    let major_version = upgrades.active_major_version(ctx.height);

    let mut fee: Amount = 0;
    for tx in transactions {
        let tx_fee = check_transaction(tx).map_err(|e| ConsensusError::TransactionValidation(e.to_string()))?;
        fee = fee
            .checked_add(tx_fee)
            .ok_or_else(|| ConsensusError::EconomicValidation("fee overflow".to_string()))?;
    }
    let transactions_size: usize = transactions.iter().map(transaction_size).sum();

    let mut params = MinerTxParams {
        major_version,
        height: ctx.height,
        median_size: ctx.median_block_size(),
        current_block_size: transactions_size,
        already_generated_coins: ctx.already_generated_coins,
        fee,
        tx_public_key,
        extra_nonce: Vec::new(),
    };

    // The reward shrinks with the size it pays for; stop once they agree
    let mut coinbase = construct_miner_tx(currency, &params, &mut output_key)?;
    for _ in 0..SIZE_ADJUSTMENT_ROUNDS {
        let size = transactions_size + transaction_size(&coinbase);
        if size == params.current_block_size {
            break;
        }
        params.current_block_size = size;
        coinbase = construct_miner_tx(currency, &params, &mut output_key)?;
    }
    let cumulative_size = transactions_size + transaction_size(&coinbase);
    if cumulative_size != params.current_block_size {
        return Err(ConsensusError::EconomicValidation(
            "miner transaction size did not settle".to_string(),
        ));
    }

    let mut block = Block {
        header: BlockHeader {
            major_version,
            minor_version: BLOCK_MINOR_VERSION_0,
            timestamp,
            previous_block_hash: ctx.parent_hash,
            nonce: 0,
        },
        parent_block: ParentBlock::default(),
        base_transaction: coinbase,
        transaction_hashes: transactions.iter().map(transaction_hash).collect(),
    };
    if major_version >= 2 {
        attach_parent_block(&mut block, ctx.height);
    }

    Ok(BlockTemplate {
        block,
        height: ctx.height,
        difficulty: ctx.difficulty,
        median_size: params.median_size,
        cumulative_size,
        already_generated_coins: ctx.already_generated_coins,
    })
}

// ============================================================================
// NONCE SEARCH
// ============================================================================

/// Result of mining attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningResult {
    Success,
    Failure,
}

/// MineBlock: ℬ × ℕ × ℕ → ℬ × {success, failure}
///
/// Try nonces from the block's current one upwards until the proof-of-work
/// hash satisfies `difficulty` or `max_attempts` is exhausted. Only the nonce
/// bytes of the proof-of-work blob change between attempts.
pub fn mine_block(mut block: Block, difficulty: Difficulty, max_attempts: u64) -> (Block, MiningResult) {
    let mut blob = proof_of_work_blob(&block);
    let offset = proof_of_work_nonce_offset(&block);
    let mut nonce = block.header.nonce;

    for _ in 0..max_attempts {
        blob[offset..offset + 4].copy_from_slice(&nonce.to_le_bytes());
        if check_hash(&pow_hash(&blob), difficulty) {
            block.header.nonce = nonce;
            return (block, MiningResult::Success);
        }
        nonce = nonce.wrapping_add(1);
    }

    (block, MiningResult::Failure)
}
