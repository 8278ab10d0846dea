//! Block header validation: version, timestamp and proof of work

use crate::acceptance::ValidationContext;
use crate::economic::median;
use crate::outcome::RejectionReason;
use crate::pow::check_proof_of_work;
use crate::types::*;
use crate::upgrade::UpgradePolicy;

type CheckResult = std::result::Result<(), RejectionReason>;

/// The major version must be the one active at the block's height. The minor
/// version is never checked.
pub fn check_major_version<U: UpgradePolicy + ?Sized>(upgrades: &U, height: BlockHeight, block: &Block) -> CheckResult {
    let expected = upgrades.active_major_version(height);
    if block.header.major_version != expected {
        return Err(RejectionReason::WrongVersion { expected, actual: block.header.major_version });
    }
    Ok(())
}

/// CheckTimestamp: ℋ × ℕ* × ℕ → {valid, invalid}
///
/// 1. timestamp ≤ now + futureTimeLimit
/// 2. Once `window` blocks precede the candidate:
///    timestamp ≥ median(last `window` timestamps)
pub fn check_timestamp(
    block: &Block,
    recent_timestamps: &[u64],
    window: usize,
    height: BlockHeight,
    future_time_limit: u64,
    now: u64,
) -> CheckResult {
    let timestamp = block.header.timestamp;
    let limit = now.saturating_add(future_time_limit);
    if timestamp > limit {
        return Err(RejectionReason::TimestampTooFarInFuture { timestamp, limit });
    }

    if (height as usize) < window {
        return Ok(());
    }
    let start = recent_timestamps.len().saturating_sub(window);
    let median = median(&recent_timestamps[start..]);
    if timestamp < median {
        return Err(RejectionReason::TimestampTooLow { timestamp, median });
    }
    Ok(())
}

/// Run the header checks in order: version, timestamp, proof of work
pub fn validate_header(ctx: &ValidationContext<'_>, block: &Block) -> CheckResult {
    check_major_version(ctx.upgrades, ctx.height, block)?;
    check_timestamp(
        block,
        &ctx.recent_timestamps,
        ctx.currency.timestamp_check_window,
        ctx.height,
        ctx.currency.block_future_time_limit,
        ctx.now,
    )?;
    Ok(())
}

/// Proof of work against the difficulty the context requires
pub fn validate_proof_of_work(ctx: &ValidationContext<'_>, block: &Block) -> CheckResult {
    if !check_proof_of_work(block, ctx.difficulty) {
        return Err(RejectionReason::ProofOfWork { difficulty: ctx.difficulty });
    }
    Ok(())
}
