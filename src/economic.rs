//! Emission, block-size penalty and denomination rules

use crate::currency::Currency;
use crate::types::Amount;

/// Median: ℕ* → ℕ
///
/// Middle element of the sorted values; mean of the two middle elements for an
/// even count, 0 for an empty slice.
pub fn median(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        // Mean without overflow
        let (a, b) = (sorted[n / 2 - 1], sorted[n / 2]);
        a / 2 + b / 2 + (a % 2 + b % 2) / 2
    }
}

/// BaseReward: ℕ → ℕ
///
/// Formula: (moneySupply - alreadyGenerated) >> emissionSpeedFactor
pub fn base_reward(currency: &Currency, already_generated_coins: Amount) -> Amount {
    currency.money_supply.saturating_sub(already_generated_coins) >> currency.emission_speed_factor
}

/// PenalizedAmount: ℕ × ℕ × ℕ → ℕ
///
/// For block size s above median m (s ≤ 2m):
/// amount × s × (2m - s) / m²
pub fn penalized_amount(amount: Amount, median_size: usize, block_size: usize) -> Amount {
    if amount == 0 || block_size <= median_size {
        return amount;
    }
    let m = median_size as u128;
    let s = block_size as u128;
    if s >= 2 * m {
        return 0;
    }
    let product = u128::from(amount) * s * (2 * m - s);
    // product / m² ≤ amount because s(2m - s) ≤ m²
    (product / m / m) as Amount
}

/// Reward a block is entitled to, with the change it makes to emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReward {
    pub reward: Amount,
    pub emission_change: i64,
}

/// GetBlockReward: ℕ₈ × ℕ × ℕ × ℕ × ℕ → ℕ ∪ {⊥}
///
/// 1. base = BaseReward(alreadyGenerated)
/// 2. m = max(median, fullRewardZone); ⊥ if size > 2m
/// 3. reward = Penalize(base) + fee (fee penalized from version 2 on)
pub fn block_reward(
    currency: &Currency,
    major_version: u8,
    median_size: usize,
    block_size: usize,
    already_generated_coins: Amount,
    fee: Amount,
) -> Option<BlockReward> {
    let base = base_reward(currency, already_generated_coins);
    let median = median_size.max(currency.block_granted_full_reward_zone);
    if block_size > 2 * median {
        return None;
    }

    let penalized_base = penalized_amount(base, median, block_size);
    let penalized_fee = if major_version >= 2 {
        penalized_amount(fee, median, block_size)
    } else {
        fee
    };

    let emission_change = i128::from(penalized_base) - (i128::from(fee) - i128::from(penalized_fee));
    Some(BlockReward {
        reward: penalized_base.checked_add(penalized_fee)?,
        emission_change: emission_change.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
    })
}

/// Canonical denomination: d × 10^k with d ∈ 1..=9, or at most the dust
/// threshold
pub fn is_canonical_amount(amount: Amount, dust_threshold: Amount) -> bool {
    if amount <= dust_threshold {
        return true;
    }
    let mut value = amount;
    while value % 10 == 0 {
        value /= 10;
    }
    value < 10
}

/// Split `amount` into canonical chunks, merging the low digits that fit
/// under the dust threshold into a single dust chunk.
///
/// Dust comes first, then chunks from the lowest significant digit upwards.
pub fn decompose_amount(amount: Amount, dust_threshold: Amount) -> Vec<Amount> {
    let mut parts = Vec::new();
    let mut remaining = amount;
    let mut order: u64 = 1;
    let mut dust: u64 = 0;
    let mut dust_emitted = false;

    while remaining != 0 {
        let chunk = (remaining % 10) * order;
        remaining /= 10;
        order = order.saturating_mul(10);

        if !dust_emitted && dust + chunk <= dust_threshold {
            dust += chunk;
        } else {
            if !dust_emitted && dust != 0 {
                parts.push(dust);
            }
            dust_emitted = true;
            if chunk != 0 {
                parts.push(chunk);
            }
        }
    }
    if !dust_emitted && dust != 0 {
        parts.push(dust);
    }
    parts
}
