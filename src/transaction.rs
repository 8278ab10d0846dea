//! Ordinary (non-coinbase) transaction validation

use crate::block::transaction_prefix_hash;
use crate::constants::MAX_BLOCK_NUMBER;
use crate::crypto::SignatureScheme;
use crate::currency::Currency;
use crate::outcome::TransactionError;
use crate::types::*;
use std::collections::HashSet;

type TxResult<T> = std::result::Result<T, TransactionError>;

/// Read access to spendable outputs and spent key images
pub trait OutputSource {
    /// Output number `global_index` among all outputs of `amount`
    fn output(&self, amount: Amount, global_index: u32) -> Option<OutputRecord>;

    fn is_key_image_spent(&self, key_image: &KeyImage) -> bool;
}

/// CheckTransaction: 𝒯𝒳 → ℕ ∪ {invalid}
///
/// Context-free rules for transaction tx:
/// 1. |tx.inputs| > 0, every input is a key input
/// 2. |tx.outputs| > 0, no zero amounts
/// 3. Σ inputs and Σ outputs fit in 64 bits, Σ inputs ≥ Σ outputs
/// 4. one signature per input, no key image used twice
///
/// Returns the fee Σ inputs - Σ outputs.
pub fn check_transaction(tx: &Transaction) -> TxResult<Amount> {
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    if tx.inputs.iter().any(|input| matches!(input, TransactionInput::Base(_))) {
        return Err(TransactionError::UnexpectedBaseInput);
    }
    if tx.outputs.iter().any(|output| output.amount == 0) {
        return Err(TransactionError::ZeroOutput);
    }

    let inputs = tx
        .key_inputs()
        .try_fold(0u64, |acc, input| acc.checked_add(input.amount))
        .ok_or(TransactionError::InputOverflow)?;
    let outputs = tx.output_sum().ok_or(TransactionError::OutputOverflow)?;
    if inputs < outputs {
        return Err(TransactionError::InsufficientInputs { inputs, outputs });
    }

    if tx.signatures.len() != tx.inputs.len() {
        return Err(TransactionError::SignatureCountMismatch {
            expected: tx.inputs.len(),
            actual: tx.signatures.len(),
        });
    }

    let mut images = HashSet::with_capacity(tx.inputs.len());
    for input in tx.key_inputs() {
        if !images.insert(input.key_image) {
            return Err(TransactionError::DuplicateKeyImage(input.key_image));
        }
    }

    Ok(inputs - outputs)
}

/// IsUnlocked: ℕ × ℕ × ℕ → {true, false}
///
/// Height-style unlock times are compared with the height of the block that
/// would spend the output, timestamp-style ones with `now`.
pub fn is_unlocked(currency: &Currency, unlock_time: u64, spending_height: BlockHeight, now: u64) -> bool {
    if unlock_time < MAX_BLOCK_NUMBER {
        let reachable = u64::from(spending_height) + u64::from(currency.locked_tx_allowed_delta_blocks);
        reachable.saturating_sub(1) >= unlock_time
    } else {
        now.saturating_add(currency.locked_tx_allowed_delta_seconds) >= unlock_time
    }
}

/// CheckTxInputs: 𝒯𝒳 × 𝒪𝒮 × ℕ → {valid, invalid}
///
/// For each key input i of tx:
/// 1. i.key_image not spent
/// 2. referenced output o exists and is unlocked at `spending_height`
/// 3. i.key_image = KeyImage(o.key)
/// 4. Verify(PrefixHash(tx), o.key, tx.signatures[i])
pub fn check_transaction_inputs<S, V>(
    currency: &Currency,
    tx: &Transaction,
    source: &S,
    scheme: &V,
    spending_height: BlockHeight,
    now: u64,
) -> TxResult<()>
where
    S: OutputSource + ?Sized,
    V: SignatureScheme + ?Sized,
{
    let prefix_hash = transaction_prefix_hash(tx);
    for (i, (input, signature)) in tx.key_inputs().zip(tx.signatures.iter()).enumerate() {
        if source.is_key_image_spent(&input.key_image) {
            return Err(TransactionError::KeyImageSpent(input.key_image));
        }
        let output = source
            .output(input.amount, input.output_index)
            .ok_or(TransactionError::OutputNotFound { amount: input.amount, index: input.output_index })?;
        if !is_unlocked(currency, output.unlock_time, spending_height, now) {
            return Err(TransactionError::OutputLocked { amount: input.amount, index: input.output_index });
        }
        if scheme.key_image(&output.key) != input.key_image {
            return Err(TransactionError::KeyImageMismatch(i));
        }
        if !scheme.verify(&prefix_hash, &output.key, signature) {
            return Err(TransactionError::InvalidSignature(i));
        }
    }
    Ok(())
}
