//! Currency policy: the fixed constants consumed by the validators
//!
//! A [`Currency`] is plain data. It can be built in code through
//! [`CurrencyBuilder`] or loaded from JSON, where every missing field takes the
//! reference value from [`crate::constants`].

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use crate::types::BlockHeight;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub money_supply: u64,
    pub emission_speed_factor: u32,
    pub difficulty_target: u64,
    pub difficulty_window: usize,
    pub difficulty_cut: usize,
    pub timestamp_check_window: usize,
    pub block_future_time_limit: u64,
    pub mined_money_unlock_window: u32,
    pub reward_blocks_window: usize,
    pub block_granted_full_reward_zone: usize,
    pub miner_tx_blob_reserved_size: usize,
    pub max_block_size_initial: usize,
    pub max_block_size_growth_speed_numerator: u64,
    pub max_block_size_growth_speed_denominator: u64,
    pub default_dust_threshold: u64,
    pub max_parent_block_size: usize,
    pub locked_tx_allowed_delta_blocks: u32,
    pub locked_tx_allowed_delta_seconds: u64,
    pub genesis_timestamp: u64,
}

impl Default for Currency {
    fn default() -> Self {
        Currency {
            money_supply: MONEY_SUPPLY,
            emission_speed_factor: EMISSION_SPEED_FACTOR,
            difficulty_target: DIFFICULTY_TARGET,
            difficulty_window: DIFFICULTY_WINDOW,
            difficulty_cut: DIFFICULTY_CUT,
            timestamp_check_window: TIMESTAMP_CHECK_WINDOW,
            block_future_time_limit: BLOCK_FUTURE_TIME_LIMIT,
            mined_money_unlock_window: MINED_MONEY_UNLOCK_WINDOW,
            reward_blocks_window: REWARD_BLOCKS_WINDOW,
            block_granted_full_reward_zone: BLOCK_GRANTED_FULL_REWARD_ZONE,
            miner_tx_blob_reserved_size: MINER_TX_BLOB_RESERVED_SIZE,
            max_block_size_initial: MAX_BLOCK_SIZE_INITIAL,
            max_block_size_growth_speed_numerator: MAX_BLOCK_SIZE_GROWTH_SPEED_NUMERATOR,
            max_block_size_growth_speed_denominator: MAX_BLOCK_SIZE_GROWTH_SPEED_DENOMINATOR,
            default_dust_threshold: DEFAULT_DUST_THRESHOLD,
            max_parent_block_size: MAX_PARENT_BLOCK_SIZE,
            locked_tx_allowed_delta_blocks: LOCKED_TX_ALLOWED_DELTA_BLOCKS,
            locked_tx_allowed_delta_seconds: LOCKED_TX_ALLOWED_DELTA_SECONDS,
            genesis_timestamp: GENESIS_TIMESTAMP,
        }
    }
}

impl Currency {
    /// Load a policy from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let currency: Currency = serde_json::from_str(json)
            .map_err(|e| ConsensusError::Configuration(e.to_string()))?;
        currency.validate()?;
        Ok(currency)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConsensusError::Serialization(e.to_string()))
    }

    /// Reject combinations the validators cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.difficulty_target == 0 {
            return Err(ConsensusError::Configuration("difficulty_target must be positive".to_string()));
        }
        if self.difficulty_window < 2 {
            return Err(ConsensusError::Configuration("difficulty_window must be at least 2".to_string()));
        }
        if 2 * self.difficulty_cut > self.difficulty_window - 2 {
            return Err(ConsensusError::Configuration(format!(
                "difficulty_cut {} leaves fewer than 2 timestamps in a window of {}",
                self.difficulty_cut, self.difficulty_window
            )));
        }
        if self.timestamp_check_window == 0 || self.reward_blocks_window == 0 {
            return Err(ConsensusError::Configuration("block windows must be positive".to_string()));
        }
        if self.max_block_size_growth_speed_denominator == 0 {
            return Err(ConsensusError::Configuration(
                "max_block_size_growth_speed_denominator must be positive".to_string(),
            ));
        }
        if self.mined_money_unlock_window as usize >= self.difficulty_window {
            return Err(ConsensusError::Configuration(
                "mined_money_unlock_window must be below difficulty_window".to_string(),
            ));
        }
        if self.emission_speed_factor == 0 || self.emission_speed_factor >= 64 {
            return Err(ConsensusError::Configuration("emission_speed_factor must be in 1..64".to_string()));
        }
        Ok(())
    }

    /// MaxBlockCumulativeSize: ℕ → ℕ
    ///
    /// Formula: initial + height × numerator / denominator
    pub fn max_block_cumulative_size(&self, height: BlockHeight) -> usize {
        let growth = u128::from(height) * u128::from(self.max_block_size_growth_speed_numerator)
            / u128::from(self.max_block_size_growth_speed_denominator.max(1));
        let size = (self.max_block_size_initial as u128).saturating_add(growth);
        usize::try_from(size).unwrap_or(usize::MAX)
    }

    /// Required unlock time of the coinbase of the block at `height`
    pub fn coinbase_unlock_time(&self, height: BlockHeight) -> u64 {
        u64::from(height) + u64::from(self.mined_money_unlock_window)
    }
}

/// Fluent construction of a [`Currency`] starting from the reference policy
#[derive(Debug, Clone, Default)]
pub struct CurrencyBuilder {
    currency: Currency,
}

impl CurrencyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn money_supply(mut self, supply: u64) -> Self {
        self.currency.money_supply = supply;
        self
    }

    pub fn difficulty_target(mut self, seconds: u64) -> Self {
        self.currency.difficulty_target = seconds;
        self
    }

    pub fn difficulty_window(mut self, blocks: usize) -> Self {
        self.currency.difficulty_window = blocks;
        self
    }

    pub fn difficulty_cut(mut self, blocks: usize) -> Self {
        self.currency.difficulty_cut = blocks;
        self
    }

    pub fn timestamp_check_window(mut self, blocks: usize) -> Self {
        self.currency.timestamp_check_window = blocks;
        self
    }

    pub fn block_future_time_limit(mut self, seconds: u64) -> Self {
        self.currency.block_future_time_limit = seconds;
        self
    }

    pub fn mined_money_unlock_window(mut self, blocks: u32) -> Self {
        self.currency.mined_money_unlock_window = blocks;
        self
    }

    pub fn reward_blocks_window(mut self, blocks: usize) -> Self {
        self.currency.reward_blocks_window = blocks;
        self
    }

    pub fn block_granted_full_reward_zone(mut self, size: usize) -> Self {
        self.currency.block_granted_full_reward_zone = size;
        self
    }

    pub fn max_block_size_initial(mut self, size: usize) -> Self {
        self.currency.max_block_size_initial = size;
        self
    }

    pub fn max_block_size_growth(mut self, numerator: u64, denominator: u64) -> Self {
        self.currency.max_block_size_growth_speed_numerator = numerator;
        self.currency.max_block_size_growth_speed_denominator = denominator;
        self
    }

    pub fn max_parent_block_size(mut self, size: usize) -> Self {
        self.currency.max_parent_block_size = size;
        self
    }

    pub fn genesis_timestamp(mut self, timestamp: u64) -> Self {
        self.currency.genesis_timestamp = timestamp;
        self
    }

    pub fn build(self) -> Result<Currency> {
        self.currency.validate()?;
        Ok(self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_policy_is_valid() {
        assert!(Currency::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let currency = Currency::from_json(r#"{ "difficulty_target": 60, "mined_money_unlock_window": 4 }"#).unwrap();
        assert_eq!(currency.difficulty_target, 60);
        assert_eq!(currency.mined_money_unlock_window, 4);
        assert_eq!(currency.difficulty_window, DIFFICULTY_WINDOW);
    }

    #[test]
    fn test_from_json_rejects_bad_cut() {
        let err = Currency::from_json(r#"{ "difficulty_window": 10, "difficulty_cut": 5 }"#).unwrap_err();
        assert!(matches!(err, ConsensusError::Configuration(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(matches!(Currency::from_json("{ not json"), Err(ConsensusError::Configuration(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let currency = CurrencyBuilder::new().difficulty_target(10).build().unwrap();
        let json = currency.to_json().unwrap();
        assert_eq!(Currency::from_json(&json).unwrap(), currency);
    }

    #[test]
    fn test_max_block_cumulative_size_grows() {
        let currency = Currency::default();
        assert_eq!(currency.max_block_cumulative_size(0), MAX_BLOCK_SIZE_INITIAL);
        let one_year = MAX_BLOCK_SIZE_GROWTH_SPEED_DENOMINATOR as BlockHeight;
        assert_eq!(
            currency.max_block_cumulative_size(one_year),
            MAX_BLOCK_SIZE_INITIAL + MAX_BLOCK_SIZE_GROWTH_SPEED_NUMERATOR as usize
        );
    }

    #[test]
    fn test_builder_rejects_unlock_window_beyond_difficulty_window() {
        let result = CurrencyBuilder::new().difficulty_window(10).difficulty_cut(0).mined_money_unlock_window(10).build();
        assert!(result.is_err());
    }
}
