//! Deterministic block and transaction fixtures
//!
//! [`Generator`] remembers every block it produced, so any of them can serve
//! as the parent of the next one. Chain-derived values (height, timestamp,
//! difficulty, reward, version) are filled in unless a [`BlockBuilder`]
//! overrides them.
//!
//! Output keys are derived from the receiving [`Account`]'s secret and the
//! transaction key. This is a fixture scheme only: the sender needs the
//! receiver's account to address it.

use crate::block::{block_id, transaction_prefix_hash};
use crate::constants::{BLOCK_MINOR_VERSION_0, CURRENT_TRANSACTION_VERSION, MIN_DIFFICULTY, NULL_HASH};
use crate::crypto::{fast_hash, Secp256k1Scheme, SignatureScheme};
use crate::currency::Currency;
use crate::difficulty::next_difficulty;
use crate::economic::{block_reward, decompose_amount, median};
use crate::extra::{append_public_key, find_public_key};
use crate::merge_mining::attach_parent_block;
use crate::mining::{construct_miner_tx, construct_miner_tx_of_size, mine_block, MinerTxParams, MiningResult};
use crate::serialization::transaction_size;
use crate::types::*;
use crate::upgrade::{UpgradePolicy, UpgradeSchedule};
use anyhow::{anyhow, bail, Context};
use secp256k1::{All, Keypair, Message, Secp256k1};
use std::collections::HashMap;
use tracing::debug;

/// Rounds the coinbase is rebuilt while its reward and the block size settle
const SETTLE_ROUNDS: usize = 16;

// ============================================================================
// ACCOUNTS
// ============================================================================

/// Key owner for fixture outputs
#[derive(Clone)]
pub struct Account {
    secret: Hash,
    secp: Secp256k1<All>,
}

impl Account {
    pub fn from_seed(seed: &[u8]) -> Self {
        Account { secret: fast_hash(seed), secp: Secp256k1::new() }
    }

    /// Public transaction key for the transaction identified by `salt`
    pub fn transaction_key(&self, salt: &[u8]) -> PublicKey {
        let mut data = b"tx".to_vec();
        data.extend_from_slice(&self.secret);
        data.extend_from_slice(salt);
        fast_hash(&data)
    }

    fn output_keypair(&self, tx_key: &PublicKey, index: usize) -> Keypair {
        let mut data = self.secret.to_vec();
        data.extend_from_slice(tx_key);
        data.extend_from_slice(&(index as u64).to_le_bytes());
        let mut candidate = fast_hash(&data);
        loop {
            if let Ok(keypair) = Keypair::from_seckey_slice(&self.secp, &candidate) {
                return keypair;
            }
            candidate = fast_hash(&candidate);
        }
    }

    /// One-time key of output `index` of the transaction with key `tx_key`
    pub fn output_key(&self, tx_key: &PublicKey, index: usize) -> PublicKey {
        self.output_keypair(tx_key, index).x_only_public_key().0.serialize()
    }

    /// Indices of the outputs of `tx` this account can spend
    pub fn owned_outputs(&self, tx: &Transaction) -> Vec<usize> {
        let Some(tx_key) = find_public_key(&tx.extra) else {
            return Vec::new();
        };
        tx.outputs
            .iter()
            .enumerate()
            .filter(|(i, output)| self.output_key(&tx_key, *i) == output.key)
            .map(|(i, _)| i)
            .collect()
    }

    fn sign(&self, keypair: &Keypair, message: &Hash) -> anyhow::Result<Signature> {
        let msg = Message::from_digest_slice(message)?;
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, keypair);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig[..]);
        Ok(Signature::from_bytes(&bytes))
    }
}

/// An output to spend: the transaction carrying it, its position there and
/// its global index among outputs of the same amount
#[derive(Debug, Clone)]
pub struct OutputSourceEntry<'a> {
    pub transaction: &'a Transaction,
    pub output_index: usize,
    pub global_index: u32,
}

/// Transaction spending `source` (owned by `owner`) to `destination`,
/// leaving `fee` to the miner.
pub fn construct_transaction(
    owner: &Account,
    source: &OutputSourceEntry<'_>,
    destination: &Account,
    fee: Amount,
    salt: &[u8],
) -> anyhow::Result<Transaction> {
    let output = source
        .transaction
        .outputs
        .get(source.output_index)
        .ok_or_else(|| anyhow!("source has no output {}", source.output_index))?;
    let source_key = find_public_key(&source.transaction.extra).context("source transaction has no public key")?;
    let keypair = owner.output_keypair(&source_key, source.output_index);
    if keypair.x_only_public_key().0.serialize() != output.key {
        bail!("output {} is not owned by the account", source.output_index);
    }

    let amount = output
        .amount
        .checked_sub(fee)
        .filter(|&a| a > 0)
        .ok_or_else(|| anyhow!("fee {} consumes the whole output {}", fee, output.amount))?;

    let tx_key = owner.transaction_key(salt);
    let mut extra = Vec::new();
    append_public_key(&mut extra, &tx_key);
    let mut tx = Transaction {
        version: CURRENT_TRANSACTION_VERSION,
        unlock_time: 0,
        inputs: vec![TransactionInput::Key(KeyInput {
            amount: output.amount,
            output_index: source.global_index,
            key_image: Secp256k1Scheme::new().key_image(&output.key),
        })],
        outputs: decompose_amount(amount, 0)
            .into_iter()
            .enumerate()
            .map(|(i, amount)| TransactionOutput { amount, key: destination.output_key(&tx_key, i) })
            .collect(),
        extra,
        signatures: Vec::new(),
    };
    let signature = owner.sign(&keypair, &transaction_prefix_hash(&tx))?;
    tx.signatures.push(signature);
    Ok(tx)
}

// ============================================================================
// BLOCK BUILDER
// ============================================================================

/// Per-block overrides; `None` fields take their chain-derived value
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    pub major_version: Option<u8>,
    pub minor_version: Option<u8>,
    pub timestamp: Option<u64>,
    pub previous_block_hash: Option<Hash>,
    pub difficulty: Option<Difficulty>,
    pub base_transaction: Option<Transaction>,
    pub transaction_hashes: Vec<Hash>,
    /// Total size of the transactions behind `transaction_hashes`
    pub transactions_size: usize,
    pub fee: Amount,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn major_version(mut self, version: u8) -> Self {
        self.major_version = Some(version);
        self
    }

    pub fn minor_version(mut self, version: u8) -> Self {
        self.minor_version = Some(version);
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn previous_block_hash(mut self, hash: Hash) -> Self {
        self.previous_block_hash = Some(hash);
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn base_transaction(mut self, tx: Transaction) -> Self {
        self.base_transaction = Some(tx);
        self
    }

    /// Include `transactions`, accounting for their size and fee
    pub fn transactions(mut self, transactions: &[Transaction], fee: Amount) -> Self {
        self.transaction_hashes = transactions.iter().map(crate::block::transaction_hash).collect();
        self.transactions_size = transactions.iter().map(transaction_size).sum();
        self.fee = fee;
        self
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct GeneratedBlock {
    info: BlockInfo,
    previous: Hash,
}

pub struct Generator {
    currency: Currency,
    upgrades: UpgradeSchedule,
    blocks: HashMap<Hash, GeneratedBlock>,
}

impl Generator {
    pub fn new(currency: Currency, upgrades: UpgradeSchedule) -> Self {
        Generator { currency, upgrades, blocks: HashMap::new() }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Bookkeeping of a block this generator produced
    pub fn info(&self, block: &Block) -> Option<BlockInfo> {
        self.blocks.get(&block_id(block)).map(|b| b.info)
    }

    /// Version 1 genesis block paying `miner`
    pub fn genesis(&mut self, miner: &Account, timestamp: u64) -> anyhow::Result<Block> {
        let tx_key = miner.transaction_key(&0u32.to_le_bytes());
        let mut params = MinerTxParams {
            major_version: 1,
            height: 0,
            median_size: 0,
            current_block_size: 0,
            already_generated_coins: 0,
            fee: 0,
            tx_public_key: tx_key,
            extra_nonce: Vec::new(),
        };
        let coinbase = self.settle_miner_tx(&mut params, 0, miner)?;
        let size = transaction_size(&coinbase);
        let generated = coinbase.output_sum().context("genesis reward overflows")?;

        let block = Block {
            header: BlockHeader {
                major_version: 1,
                minor_version: BLOCK_MINOR_VERSION_0,
                timestamp,
                previous_block_hash: NULL_HASH,
                nonce: 0,
            },
            parent_block: ParentBlock::default(),
            base_transaction: coinbase,
            transaction_hashes: Vec::new(),
        };
        let info = BlockInfo {
            hash: block_id(&block),
            height: 0,
            timestamp,
            difficulty: MIN_DIFFICULTY,
            cumulative_difficulty: MIN_DIFFICULTY,
            size,
            already_generated_coins: generated,
        };
        self.blocks.insert(info.hash, GeneratedBlock { info, previous: NULL_HASH });
        Ok(block)
    }

    fn parent_info(&self, parent: &Block) -> anyhow::Result<BlockInfo> {
        self.info(parent).ok_or_else(|| anyhow!("parent block was not produced by this generator"))
    }

    /// Up to `count` blocks ending with `tip`, oldest first
    fn history(&self, tip: &Hash, count: usize) -> Vec<BlockInfo> {
        let mut infos = Vec::with_capacity(count);
        let mut cursor = *tip;
        while infos.len() < count {
            let Some(block) = self.blocks.get(&cursor) else { break };
            infos.push(block.info);
            if block.info.height == 0 {
                break;
            }
            cursor = block.previous;
        }
        infos.reverse();
        infos
    }

    /// Difficulty a child of `parent` must meet
    pub fn next_difficulty(&self, parent: &Block) -> anyhow::Result<Difficulty> {
        let info = self.parent_info(parent)?;
        let window = self.history(&info.hash, self.currency.difficulty_window);
        let (timestamps, cumulative): (Vec<u64>, Vec<Difficulty>) =
            window.iter().map(|i| (i.timestamp, i.cumulative_difficulty)).unzip();
        Ok(next_difficulty(&self.currency, &timestamps, &cumulative))
    }

    /// Median block size seen by a child of `parent`, before flooring
    fn median_size(&self, parent: &BlockInfo) -> usize {
        let sizes: Vec<u64> = self
            .history(&parent.hash, self.currency.reward_blocks_window)
            .iter()
            .map(|i| i.size as u64)
            .collect();
        median(&sizes) as usize
    }

    fn miner_params(&self, parent: &BlockInfo, major_version: u8, miner: &Account, fee: Amount) -> MinerTxParams {
        let height = parent.height + 1;
        MinerTxParams {
            major_version,
            height,
            median_size: self.median_size(parent),
            current_block_size: 0,
            already_generated_coins: parent.already_generated_coins,
            fee,
            tx_public_key: miner.transaction_key(&height.to_le_bytes()),
            extra_nonce: Vec::new(),
        }
    }

    fn settle_miner_tx(
        &self,
        params: &mut MinerTxParams,
        transactions_size: usize,
        miner: &Account,
    ) -> anyhow::Result<Transaction> {
        let tx_key = params.tx_public_key;
        let output_key = |i: usize| miner.output_key(&tx_key, i);
        params.current_block_size = transactions_size;
        let mut tx = construct_miner_tx(&self.currency, params, output_key)?;
        for _ in 0..SETTLE_ROUNDS {
            let size = transactions_size + transaction_size(&tx);
            if size == params.current_block_size {
                return Ok(tx);
            }
            params.current_block_size = size;
            tx = construct_miner_tx(&self.currency, params, output_key)?;
        }
        bail!("miner transaction size did not settle")
    }

    /// The miner transaction a default child of `parent` would carry
    pub fn miner_tx(&self, parent: &Block, miner: &Account) -> anyhow::Result<Transaction> {
        let info = self.parent_info(parent)?;
        let version = self.upgrades.active_major_version(info.height + 1);
        let mut params = self.miner_params(&info, version, miner, 0);
        self.settle_miner_tx(&mut params, 0, miner)
    }

    /// Child of `parent` with every field chain-derived
    pub fn next_block(&mut self, parent: &Block, miner: &Account) -> anyhow::Result<Block> {
        self.build(parent, miner, BlockBuilder::default())
    }

    /// `count` consecutive default blocks on `parent`, in height order
    pub fn rewind(&mut self, parent: &Block, miner: &Account, count: usize) -> anyhow::Result<Vec<Block>> {
        let mut blocks: Vec<Block> = Vec::with_capacity(count);
        for _ in 0..count {
            let block = self.next_block(blocks.last().unwrap_or(parent), miner)?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// `count` blocks sharing the parent's timestamp. Each mined at the
    /// difficulty then required, so difficulty climbs as fast as the retarget
    /// allows.
    pub fn lift_difficulty(&mut self, parent: &Block, miner: &Account, count: usize) -> anyhow::Result<Vec<Block>> {
        let mut blocks: Vec<Block> = Vec::with_capacity(count);
        for _ in 0..count {
            let prev = blocks.last().unwrap_or(parent);
            let builder = BlockBuilder::new().timestamp(prev.header.timestamp);
            let block = self.build(prev, miner, builder)?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Child of `parent` whose cumulative size is one byte below twice the
    /// effective median, the largest size still paying a reward.
    pub fn max_size_block(&mut self, parent: &Block, miner: &Account) -> anyhow::Result<Block> {
        let info = self.parent_info(parent)?;
        let version = self.upgrades.active_major_version(info.height + 1);
        let mut params = self.miner_params(&info, version, miner, 0);
        let target = 2 * params.median_size.max(self.currency.block_granted_full_reward_zone) - 1;
        params.current_block_size = target;

        let tx_key = params.tx_public_key;
        let coinbase = construct_miner_tx_of_size(&self.currency, &params, target, |i| miner.output_key(&tx_key, i))?;
        self.build(parent, miner, BlockBuilder::new().base_transaction(coinbase))
    }

    /// Assemble, mine and remember a child of `parent`
    pub fn build(&mut self, parent: &Block, miner: &Account, builder: BlockBuilder) -> anyhow::Result<Block> {
        let parent_info = self.parent_info(parent)?;
        let height = parent_info.height + 1;
        let major_version = builder
            .major_version
            .unwrap_or_else(|| self.upgrades.active_major_version(height));
        let difficulty = match builder.difficulty {
            Some(difficulty) => difficulty,
            None => self.next_difficulty(parent)?,
        };

        let mut params = self.miner_params(&parent_info, major_version, miner, builder.fee);
        let coinbase = match builder.base_transaction {
            Some(tx) => tx,
            None => self.settle_miner_tx(&mut params, builder.transactions_size, miner)?,
        };
        let size = builder.transactions_size + transaction_size(&coinbase);

        let mut block = Block {
            header: BlockHeader {
                major_version,
                minor_version: builder.minor_version.unwrap_or(BLOCK_MINOR_VERSION_0),
                timestamp: builder
                    .timestamp
                    .unwrap_or(parent_info.timestamp + self.currency.difficulty_target),
                previous_block_hash: builder.previous_block_hash.unwrap_or(parent_info.hash),
                nonce: 0,
            },
            parent_block: ParentBlock::default(),
            base_transaction: coinbase,
            transaction_hashes: builder.transaction_hashes,
        };
        if major_version >= 2 {
            attach_parent_block(&mut block, height);
        }

        let (block, result) = mine_block(block, difficulty, 1 << 32);
        if result == MiningResult::Failure {
            bail!("no nonce satisfies difficulty {}", difficulty);
        }

        let emission = block_reward(
            &self.currency,
            major_version,
            params.median_size,
            size,
            parent_info.already_generated_coins,
            builder.fee,
        )
        .map(|reward| reward.emission_change)
        .unwrap_or(0);
        let generated = i128::from(parent_info.already_generated_coins) + i128::from(emission);

        let info = BlockInfo {
            hash: block_id(&block),
            height,
            timestamp: block.header.timestamp,
            difficulty,
            cumulative_difficulty: parent_info.cumulative_difficulty.saturating_add(difficulty),
            size,
            already_generated_coins: u64::try_from(generated.max(0)).unwrap_or(u64::MAX),
        };
        debug!(height, difficulty, size, "generated block");
        self.blocks.insert(info.hash, GeneratedBlock { info, previous: parent_info.hash });
        Ok(block)
    }
}
