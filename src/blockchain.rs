//! In-memory main chain with output index, spent key images and a
//! transaction pool
//!
//! Only the main chain is stored. Blocks that do not extend the tip are
//! evaluated and reported but never kept, so there are no reorganizations.

use crate::acceptance::{evaluate_raw_block, BlockDecision, ChainState, ValidatedBlock};
use crate::block::{block_id, declared_height, transaction_hash};
use crate::coinbase::validate_coinbase;
use crate::constants::{MIN_DIFFICULTY, NULL_HASH};
use crate::crypto::{Secp256k1Scheme, SignatureScheme};
use crate::currency::Currency;
use crate::difficulty::next_difficulty;
use crate::error::{ConsensusError, Result};
use crate::outcome::BlockAcceptanceOutcome;
use crate::serialization::{serialize_block, transaction_size};
use crate::transaction::{check_transaction, check_transaction_inputs, OutputSource};
use crate::types::*;
use crate::upgrade::UpgradePolicy;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// A main-chain block with its bookkeeping
#[derive(Debug, Clone)]
pub struct BlockEntry {
    pub block: Block,
    pub info: BlockInfo,
    pub transactions: Vec<Transaction>,
}

pub struct Blockchain {
    currency: Currency,
    upgrades: Box<dyn UpgradePolicy>,
    scheme: Box<dyn SignatureScheme>,
    entries: Vec<BlockEntry>,
    heights: HashMap<Hash, BlockHeight>,
    outputs: HashMap<Amount, Vec<OutputRecord>>,
    spent_key_images: HashSet<KeyImage>,
    pool: HashMap<Hash, Transaction>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Blockchain {
    /// Start a chain from `genesis`, verifying Schnorr signatures over
    /// secp256k1.
    pub fn new<U>(currency: Currency, upgrades: U, genesis: Block) -> Result<Self>
    where
        U: UpgradePolicy + 'static,
    {
        Self::with_signature_scheme(currency, upgrades, Secp256k1Scheme::new(), genesis)
    }

    /// Start a chain from `genesis`.
    ///
    /// Genesis skips proof of work, difficulty and reward checks. It must have
    /// a null previous hash and a structurally valid coinbase for height 0.
    pub fn with_signature_scheme<U, S>(currency: Currency, upgrades: U, scheme: S, genesis: Block) -> Result<Self>
    where
        U: UpgradePolicy + 'static,
        S: SignatureScheme + 'static,
    {
        currency.validate()?;
        if genesis.header.previous_block_hash != NULL_HASH {
            return Err(ConsensusError::BlockValidation(
                "genesis block must not reference a previous block".to_string(),
            ));
        }
        if !genesis.transaction_hashes.is_empty() {
            return Err(ConsensusError::BlockValidation(
                "genesis block must not carry transactions".to_string(),
            ));
        }
        if declared_height(&genesis) != Some(0) {
            return Err(ConsensusError::BlockValidation("genesis coinbase must bind height 0".to_string()));
        }
        let generated = validate_coinbase(&currency, &genesis.base_transaction, 0, genesis.header.timestamp)
            .map_err(|e| ConsensusError::BlockValidation(format!("genesis coinbase: {}", e)))?;

        let id = block_id(&genesis);
        let info = BlockInfo {
            hash: id,
            height: 0,
            timestamp: genesis.header.timestamp,
            difficulty: MIN_DIFFICULTY,
            cumulative_difficulty: MIN_DIFFICULTY,
            size: transaction_size(&genesis.base_transaction),
            already_generated_coins: generated,
        };

        let mut chain = Blockchain {
            currency,
            upgrades: Box::new(upgrades),
            scheme: Box::new(scheme),
            entries: Vec::new(),
            heights: HashMap::new(),
            outputs: HashMap::new(),
            spent_key_images: HashSet::new(),
            pool: HashMap::new(),
        };
        chain.push_entry(BlockEntry { block: genesis, info, transactions: Vec::new() });
        info!(id = ?id, "genesis installed");
        Ok(chain)
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn upgrades(&self) -> &dyn UpgradePolicy {
        self.upgrades.as_ref()
    }

    /// Height of the tip
    pub fn height(&self) -> BlockHeight {
        self.entries.len().saturating_sub(1) as BlockHeight
    }

    pub fn tip(&self) -> &BlockEntry {
        &self.entries[self.entries.len() - 1]
    }

    pub fn entry(&self, height: BlockHeight) -> Option<&BlockEntry> {
        self.entries.get(height as usize)
    }

    pub fn entry_by_hash(&self, hash: &Hash) -> Option<&BlockEntry> {
        self.heights.get(hash).and_then(|&h| self.entry(h))
    }

    pub fn pool(&self) -> impl Iterator<Item = (&Hash, &Transaction)> {
        self.pool.iter()
    }

    /// Difficulty the next block on the tip must meet
    pub fn next_difficulty(&self) -> Difficulty {
        let window = self.currency.difficulty_window;
        let start = self.entries.len().saturating_sub(window);
        let (timestamps, cumulative): (Vec<u64>, Vec<Difficulty>) = self.entries[start..]
            .iter()
            .map(|e| (e.info.timestamp, e.info.cumulative_difficulty))
            .unzip();
        next_difficulty(&self.currency, &timestamps, &cumulative)
    }

    // ========================================================================
    // TRANSACTION POOL
    // ========================================================================

    /// Add a transaction to the pool, checked against the tip at wall-clock
    /// time.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<Hash> {
        self.add_transaction_at(tx, unix_now())
    }

    /// Add a transaction to the pool, checked against the tip at `now`.
    ///
    /// Key images already claimed by a pooled transaction are refused.
    pub fn add_transaction_at(&mut self, tx: Transaction, now: u64) -> Result<Hash> {
        let hash = transaction_hash(&tx);
        if self.pool.contains_key(&hash) {
            return Ok(hash);
        }

        check_transaction(&tx).map_err(|e| ConsensusError::TransactionValidation(e.to_string()))?;
        let spending_height = self.height() + 1;
        check_transaction_inputs(&self.currency, &tx, &*self, self.scheme.as_ref(), spending_height, now)
            .map_err(|e| ConsensusError::TransactionValidation(e.to_string()))?;

        let pooled: HashSet<KeyImage> = self
            .pool
            .values()
            .flat_map(|pooled| pooled.key_inputs().map(|input| input.key_image))
            .collect();
        if let Some(input) = tx.key_inputs().find(|input| pooled.contains(&input.key_image)) {
            return Err(ConsensusError::TransactionValidation(format!(
                "key image {:02x?} already in pool",
                input.key_image
            )));
        }

        debug!(hash = ?hash, "transaction added to pool");
        self.pool.insert(hash, tx);
        Ok(hash)
    }

    // ========================================================================
    // BLOCKS
    // ========================================================================

    pub fn add_block(&mut self, block: &Block) -> BlockAcceptanceOutcome {
        self.add_block_at(&serialize_block(block), unix_now())
    }

    /// Submit a serialized block evaluated at time `now`
    pub fn add_block_at(&mut self, bytes: &[u8], now: u64) -> BlockAcceptanceOutcome {
        let raw = RawBlock { block: bytes.to_vec(), transactions: Vec::new() };
        self.add_raw_block_at(&raw, now)
    }

    pub fn add_raw_block(&mut self, raw: &RawBlock) -> BlockAcceptanceOutcome {
        self.add_raw_block_at(raw, unix_now())
    }

    /// Submit a serialized block with the serialized transactions it
    /// references. Transactions not attached are taken from the pool.
    pub fn add_raw_block_at(&mut self, raw: &RawBlock, now: u64) -> BlockAcceptanceOutcome {
        let decision = evaluate_raw_block(
            &*self,
            &self.currency,
            self.upgrades.as_ref(),
            self.scheme.as_ref(),
            raw,
            now,
        );
        match decision {
            BlockDecision::Accept(validated) => {
                self.apply(*validated);
                BlockAcceptanceOutcome::AddedToMain
            }
            BlockDecision::Outcome(outcome) => outcome,
        }
    }

    fn apply(&mut self, validated: ValidatedBlock) {
        let parent = self.tip().info;
        let generated = i128::from(parent.already_generated_coins) + i128::from(validated.emission_change);
        let already_generated_coins = u64::try_from(generated.max(0)).unwrap_or(u64::MAX);
        if generated < 0 {
            warn!(height = validated.height, "emission change below zero generated coins");
        }

        let info = BlockInfo {
            hash: validated.id,
            height: validated.height,
            timestamp: validated.block.header.timestamp,
            difficulty: validated.difficulty,
            cumulative_difficulty: parent.cumulative_difficulty.saturating_add(validated.difficulty),
            size: validated.size,
            already_generated_coins,
        };

        for tx in &validated.transactions {
            self.pool.remove(&transaction_hash(tx));
        }
        self.push_entry(BlockEntry {
            block: validated.block,
            info,
            transactions: validated.transactions,
        });
    }

    fn push_entry(&mut self, entry: BlockEntry) {
        let height = entry.info.height;
        let coinbase = &entry.block.base_transaction;
        for tx in std::iter::once(coinbase).chain(entry.transactions.iter()) {
            for input in tx.key_inputs() {
                self.spent_key_images.insert(input.key_image);
            }
            for output in &tx.outputs {
                self.outputs.entry(output.amount).or_default().push(OutputRecord {
                    key: output.key,
                    unlock_time: tx.unlock_time,
                    height,
                });
            }
        }
        self.heights.insert(entry.info.hash, height);
        self.entries.push(entry);
    }

    /// Global index the next output of `amount` will receive
    pub fn output_count(&self, amount: Amount) -> u32 {
        self.outputs.get(&amount).map_or(0, |outs| outs.len() as u32)
    }

    /// Global indices of the outputs of `tx_hash` in a main-chain block,
    /// in output order
    pub fn output_indices(&self, tx_hash: &Hash) -> Option<Vec<u32>> {
        let mut counts: HashMap<Amount, u32> = HashMap::new();
        for entry in &self.entries {
            let txs = std::iter::once(&entry.block.base_transaction).chain(entry.transactions.iter());
            for tx in txs {
                let found = transaction_hash(tx) == *tx_hash;
                let mut indices = Vec::with_capacity(tx.outputs.len());
                for output in &tx.outputs {
                    let count = counts.entry(output.amount).or_default();
                    indices.push(*count);
                    *count += 1;
                }
                if found {
                    return Some(indices);
                }
            }
        }
        None
    }
}

impl OutputSource for Blockchain {
    fn output(&self, amount: Amount, global_index: u32) -> Option<OutputRecord> {
        self.outputs.get(&amount)?.get(global_index as usize).copied()
    }

    fn is_key_image_spent(&self, key_image: &KeyImage) -> bool {
        self.spent_key_images.contains(key_image)
    }
}

impl ChainState for Blockchain {
    fn tip_height(&self) -> BlockHeight {
        self.height()
    }

    fn tip_hash(&self) -> Hash {
        self.tip().info.hash
    }

    fn block_at(&self, height: BlockHeight) -> Option<BlockHeader> {
        self.entry(height).map(|e| e.block.header.clone())
    }

    fn is_known(&self, hash: &Hash) -> bool {
        self.heights.contains_key(hash)
    }

    fn pool_transaction_count(&self) -> usize {
        self.pool.len()
    }

    fn height_of(&self, hash: &Hash) -> Option<BlockHeight> {
        self.heights.get(hash).copied()
    }

    fn block_info(&self, height: BlockHeight) -> Option<BlockInfo> {
        self.entry(height).map(|e| e.info)
    }

    fn pool_transaction(&self, hash: &Hash) -> Option<Transaction> {
        self.pool.get(hash).cloned()
    }
}
