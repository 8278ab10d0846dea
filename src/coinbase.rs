//! Miner (coinbase) transaction validation
//!
//! Only the block's `base_transaction` is a coinbase. A height-binding input
//! anywhere else is an error of the enclosing transaction, never a coinbase.

use crate::constants::MAX_BLOCK_NUMBER;
use crate::currency::Currency;
use crate::economic::is_canonical_amount;
use crate::outcome::CoinbaseError;
use crate::types::*;

type CoinbaseResult<T> = std::result::Result<T, CoinbaseError>;

/// CheckCoinbase: 𝒯𝒳 × ℕ × ℕ → {valid, invalid}
///
/// For coinbase tx of the block at height h with timestamp t:
/// 1. |tx.inputs| = 1 and tx.inputs[0] = BaseInput(h)
/// 2. tx.unlock_time = h + minedMoneyUnlockWindow
/// 3. |tx.outputs| ≥ 1, every amount canonical, Σ amounts fits in 64 bits
pub fn validate_coinbase(
    currency: &Currency,
    tx: &Transaction,
    height: BlockHeight,
    block_timestamp: u64,
) -> CoinbaseResult<Amount> {
    let base = match tx.inputs.as_slice() {
        [] => return Err(CoinbaseError::NoInputs),
        [TransactionInput::Base(base)] => base,
        [TransactionInput::Key(_)] => return Err(CoinbaseError::WrongInputType),
        [_, _, ..] => return Err(CoinbaseError::ExtraInput),
    };

    if base.block_index < height {
        return Err(CoinbaseError::HeightLow { expected: height, actual: base.block_index });
    }
    if base.block_index > height {
        return Err(CoinbaseError::HeightHigh { expected: height, actual: base.block_index });
    }

    check_unlock_time(currency, tx.unlock_time, height, block_timestamp)?;

    if tx.outputs.is_empty() {
        return Err(CoinbaseError::NoOutputs);
    }
    if let Some(output) = tx
        .outputs
        .iter()
        .find(|output| !is_canonical_amount(output.amount, currency.default_dust_threshold))
    {
        return Err(CoinbaseError::NonCanonicalOutput(output.amount));
    }
    tx.output_sum().ok_or(CoinbaseError::OutputOverflow)
}

/// The unlock time must be exactly `height + window`. A timestamp-style value
/// never matches; it is reported as low when it precedes the block timestamp.
fn check_unlock_time(currency: &Currency, unlock_time: u64, height: BlockHeight, block_timestamp: u64) -> CoinbaseResult<()> {
    let expected = currency.coinbase_unlock_time(height);
    if unlock_time == expected {
        return Ok(());
    }
    let low = if unlock_time >= MAX_BLOCK_NUMBER {
        unlock_time < block_timestamp
    } else {
        unlock_time < expected
    };
    if low {
        Err(CoinbaseError::UnlockLow { expected, actual: unlock_time })
    } else {
        Err(CoinbaseError::UnlockHigh { expected, actual: unlock_time })
    }
}

/// Σ outputs must equal the reward exactly
pub fn check_coinbase_reward(output_sum: Amount, expected: Amount) -> CoinbaseResult<()> {
    if output_sum < expected {
        return Err(CoinbaseError::RewardTooSmall { expected, actual: output_sum });
    }
    if output_sum > expected {
        return Err(CoinbaseError::RewardTooLarge { expected, actual: output_sum });
    }
    Ok(())
}
