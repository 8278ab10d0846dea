//! Block size governor: per-height ceiling on cumulative block size

use crate::currency::Currency;
use crate::economic::median;
use crate::outcome::RejectionReason;
use crate::serialization::transaction_size;
use crate::types::*;

/// Median of the trailing block sizes, floored at the full-reward zone
pub fn effective_median_size(currency: &Currency, recent_sizes: &[usize]) -> usize {
    let sizes: Vec<u64> = recent_sizes.iter().map(|&s| s as u64).collect();
    let median = usize::try_from(median(&sizes)).unwrap_or(usize::MAX);
    median.max(currency.block_granted_full_reward_zone)
}

/// SizeCeiling: ℕ × ℕ* → ℕ
///
/// Formula: min(MaxBlockCumulativeSize(height), 2 × max(median, fullRewardZone))
pub fn block_size_ceiling(currency: &Currency, height: BlockHeight, recent_sizes: &[usize]) -> usize {
    let penalty_limit = effective_median_size(currency, recent_sizes).saturating_mul(2);
    currency.max_block_cumulative_size(height).min(penalty_limit)
}

/// Cumulative size: coinbase plus every referenced transaction
pub fn cumulative_block_size(block: &Block, transactions: &[Transaction]) -> usize {
    transaction_size(&block.base_transaction)
        + transactions.iter().map(transaction_size).sum::<usize>()
}

pub fn check_block_size(
    currency: &Currency,
    height: BlockHeight,
    recent_sizes: &[usize],
    size: usize,
) -> std::result::Result<(), RejectionReason> {
    let limit = block_size_ceiling(currency, height, recent_sizes);
    if size > limit {
        return Err(RejectionReason::CumulativeSizeTooBig { size, limit });
    }
    Ok(())
}

/// Outcome of extrapolating maximum-size blocks height by height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthRun {
    /// Sizes of the blocks that fit, in height order starting at 1
    pub accepted: Vec<usize>,
    /// First height whose block exceeded the ceiling, with that block's size
    pub first_violation: Option<(BlockHeight, usize)>,
}

/// Extend a chain with blocks of size `size_for(height, recent_sizes)` and
/// stop at the first one the ceiling rejects. No height past the first
/// violation is evaluated.
pub fn simulate_growth<F>(
    currency: &Currency,
    genesis_size: usize,
    max_height: BlockHeight,
    mut size_for: F,
) -> GrowthRun
where
    F: FnMut(BlockHeight, &[usize]) -> usize,
{
    let mut sizes = vec![genesis_size];
    let mut run = GrowthRun { accepted: Vec::new(), first_violation: None };
    for height in 1..=max_height {
        let start = sizes.len().saturating_sub(currency.reward_blocks_window);
        let recent = &sizes[start..];
        let size = size_for(height, recent);
        if check_block_size(currency, height, recent, size).is_err() {
            run.first_violation = Some((height, size));
            break;
        }
        run.accepted.push(size);
        sizes.push(size);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyBuilder;

    #[test]
    fn test_ceiling_is_floor_at_start() {
        let currency = Currency::default();
        assert_eq!(block_size_ceiling(&currency, 1, &[100]), currency.max_block_cumulative_size(1));
    }

    #[test]
    fn test_ceiling_bounded_by_median() {
        let currency = CurrencyBuilder::new().max_block_size_initial(1_000_000).build().unwrap();
        assert_eq!(block_size_ceiling(&currency, 1, &[]), 2 * currency.block_granted_full_reward_zone);
        assert_eq!(block_size_ceiling(&currency, 1, &[30_000, 30_000, 30_000]), 60_000);
    }

    #[test]
    fn test_check_block_size() {
        let currency = Currency::default();
        let limit = block_size_ceiling(&currency, 1, &[]);
        assert!(check_block_size(&currency, 1, &[], limit).is_ok());
        assert_eq!(
            check_block_size(&currency, 1, &[], limit + 1),
            Err(RejectionReason::CumulativeSizeTooBig { size: limit + 1, limit })
        );
    }

    #[test]
    fn test_growth_stops_at_first_violation() {
        let currency = CurrencyBuilder::new()
            .max_block_size_initial(50_000)
            .max_block_size_growth(0, 1)
            .build()
            .unwrap();
        let mut evaluated = Vec::new();
        let run = simulate_growth(&currency, 200, 1000, |height, recent| {
            evaluated.push(height);
            2 * effective_median_size(&currency, recent) - 1
        });
        let (height, size) = run.first_violation.expect("ceiling must be reached");
        assert!(size > 50_000);
        assert_eq!(run.accepted.len() as BlockHeight, height - 1);
        assert_eq!(evaluated.last(), Some(&height));
        assert!(run.accepted.iter().all(|&s| s <= 50_000));
    }
}
