//! Difficulty retargeting from a sliding window of past blocks

use crate::constants::MIN_DIFFICULTY;
use crate::currency::Currency;
use crate::types::Difficulty;

/// NextDifficulty: ℕ* × ℕ* → ℕ
///
/// For the last W timestamps T and cumulative difficulties C (W = window):
/// 1. If |T| < 2: return 1
/// 2. Sort a copy of T; keep the central W - 2·cut entries [b, e)
/// 3. Let timeSpan = max(1, T[e-1] - T[b])
/// 4. Let work = C[e-1] - C[b]
/// 5. Return max(1, ⌈work × target / timeSpan⌉)
///
/// Cumulative difficulties are read in chain order. The result saturates at
/// `u64::MAX`. Pure: identical inputs give identical output.
pub fn next_difficulty(currency: &Currency, timestamps: &[u64], cumulative_difficulties: &[Difficulty]) -> Difficulty {
    let window = currency.difficulty_window;
    let len = timestamps.len().min(cumulative_difficulties.len()).min(window);
    if len < 2 {
        return MIN_DIFFICULTY;
    }

    let mut sorted = timestamps[timestamps.len() - len..].to_vec();
    sorted.sort_unstable();
    let cumulative = &cumulative_difficulties[cumulative_difficulties.len() - len..];

    let kept = window.saturating_sub(2 * currency.difficulty_cut).max(2);
    let (cut_begin, cut_end) = if len <= kept {
        (0, len)
    } else {
        let begin = (len - kept + 1) / 2;
        (begin, begin + kept)
    };

    let time_span = sorted[cut_end - 1].saturating_sub(sorted[cut_begin]).max(1);
    let total_work = cumulative[cut_end - 1].saturating_sub(cumulative[cut_begin]);
    if total_work == 0 {
        return MIN_DIFFICULTY;
    }

    let numerator = u128::from(total_work) * u128::from(currency.difficulty_target);
    let difficulty = numerator.div_ceil(u128::from(time_span));
    u64::try_from(difficulty).unwrap_or(u64::MAX).max(MIN_DIFFICULTY)
}
