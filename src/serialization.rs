//! Binary codec for blocks, parent blocks and transactions
//!
//! Wire rules:
//! - integers are unsigned LEB128 varints, minimally encoded
//! - nonces are fixed 4-byte little-endian
//! - hashes, keys and key images are raw 32-byte strings
//! - signatures are 64 bytes, one per key input, with no count prefix
//!
//! Decoding never panics: every read is bounds-checked against the remaining
//! input and every count is bounded by the bytes left before allocating.
//! Encoding is infallible and canonical, so `encode(decode(b)) == b` for every
//! `b` that decodes.

use crate::constants::{BLOCK_MAJOR_VERSION_1, BLOCK_MAJOR_VERSION_3, MAX_MERGE_MINING_DEPTH};
use crate::crypto::tree_depth;
use crate::error::DecodeError;
use crate::extra::find_merge_mining_tag;
use crate::types::*;

pub const TAG_BASE_INPUT: u8 = 0xff;
pub const TAG_KEY_INPUT: u8 = 0x02;
pub const TAG_KEY_OUTPUT: u8 = 0x02;

const SIGNATURE_SIZE: usize = 64;

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Append-only byte sink
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over untrusted bytes
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEnd { needed: len, remaining: self.remaining() });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32_le(&mut self) -> DecodeResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_hash(&mut self) -> DecodeResult<Hash> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(self.read_bytes(32)?);
        Ok(hash)
    }

    /// Read a minimally encoded LEB128 varint
    pub fn read_varint(&mut self) -> DecodeResult<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                if byte == 0 && shift > 0 {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_varint_u8(&mut self, field: &'static str) -> DecodeResult<u8> {
        let value = self.read_varint()?;
        u8::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { field, value })
    }

    pub fn read_varint_u16(&mut self, field: &'static str) -> DecodeResult<u16> {
        let value = self.read_varint()?;
        u16::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { field, value })
    }

    pub fn read_varint_u32(&mut self, field: &'static str) -> DecodeResult<u32> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { field, value })
    }

    /// Read a varint element count whose elements take at least
    /// `min_element_size` bytes each
    pub fn read_count(&mut self, min_element_size: usize) -> DecodeResult<usize> {
        let count = self.read_varint()?;
        let needed = (count as u128) * (min_element_size.max(1) as u128);
        if needed > self.remaining() as u128 {
            return Err(DecodeError::UnexpectedEnd {
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    pub fn finish(&self) -> DecodeResult<()> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(DecodeError::TrailingBytes(trailing)),
        }
    }
}

/// Encoded length of `value` as a varint
pub fn varint_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.write_varint(value);
    writer.into_bytes()
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Write everything but the signatures
pub fn write_transaction_prefix(writer: &mut BinaryWriter, tx: &Transaction) {
    writer.write_varint(u64::from(tx.version));
    writer.write_varint(tx.unlock_time);

    writer.write_varint(tx.inputs.len() as u64);
    for input in &tx.inputs {
        match input {
            TransactionInput::Base(base) => {
                writer.write_u8(TAG_BASE_INPUT);
                writer.write_varint(u64::from(base.block_index));
            }
            TransactionInput::Key(key) => {
                writer.write_u8(TAG_KEY_INPUT);
                writer.write_varint(key.amount);
                writer.write_varint(u64::from(key.output_index));
                writer.write_bytes(&key.key_image);
            }
        }
    }

    writer.write_varint(tx.outputs.len() as u64);
    for output in &tx.outputs {
        writer.write_varint(output.amount);
        writer.write_u8(TAG_KEY_OUTPUT);
        writer.write_bytes(&output.key);
    }

    writer.write_varint(tx.extra.len() as u64);
    writer.write_bytes(&tx.extra);
}

pub fn write_transaction(writer: &mut BinaryWriter, tx: &Transaction) {
    write_transaction_prefix(writer, tx);
    for signature in &tx.signatures {
        writer.write_bytes(&signature.r);
        writer.write_bytes(&signature.s);
    }
}

pub fn read_transaction(reader: &mut BinaryReader<'_>) -> DecodeResult<Transaction> {
    let version = reader.read_varint_u8("transaction version")?;
    let unlock_time = reader.read_varint()?;

    // Smallest input: tag + one-byte varint
    let input_count = reader.read_count(2)?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let input = match reader.read_u8()? {
            TAG_BASE_INPUT => TransactionInput::Base(BaseInput {
                block_index: reader.read_varint_u32("block index")?,
            }),
            TAG_KEY_INPUT => TransactionInput::Key(KeyInput {
                amount: reader.read_varint()?,
                output_index: reader.read_varint_u32("output index")?,
                key_image: reader.read_hash()?,
            }),
            tag => return Err(DecodeError::UnknownInputTag(tag)),
        };
        inputs.push(input);
    }

    // Smallest output: amount + tag + key
    let output_count = reader.read_count(34)?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let amount = reader.read_varint()?;
        let tag = reader.read_u8()?;
        if tag != TAG_KEY_OUTPUT {
            return Err(DecodeError::UnknownOutputTag(tag));
        }
        outputs.push(TransactionOutput { amount, key: reader.read_hash()? });
    }

    let extra_len = reader.read_count(1)?;
    let extra = reader.read_bytes(extra_len)?.to_vec();

    let key_inputs = inputs.iter().filter(|i| matches!(i, TransactionInput::Key(_))).count();
    let mut signatures = Vec::with_capacity(key_inputs.min(reader.remaining() / SIGNATURE_SIZE));
    for _ in 0..key_inputs {
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(reader.read_bytes(SIGNATURE_SIZE)?);
        signatures.push(Signature::from_bytes(&bytes));
    }

    Ok(Transaction { version, unlock_time, inputs, outputs, extra, signatures })
}

pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    write_transaction(&mut writer, tx);
    writer.into_bytes()
}

pub fn serialize_transaction_prefix(tx: &Transaction) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    write_transaction_prefix(&mut writer, tx);
    writer.into_bytes()
}

pub fn deserialize_transaction(bytes: &[u8]) -> DecodeResult<Transaction> {
    let mut reader = BinaryReader::new(bytes);
    let tx = read_transaction(&mut reader)?;
    reader.finish()?;
    Ok(tx)
}

pub fn transaction_size(tx: &Transaction) -> usize {
    serialize_transaction(tx).len()
}

// ============================================================================
// BLOCKS
// ============================================================================

/// Write the full parent block section of a version ≥ 2 block.
///
/// The block's own timestamp and nonce travel inside this section.
pub fn write_parent_block(writer: &mut BinaryWriter, block: &Block) {
    let parent = &block.parent_block;
    writer.write_varint(u64::from(parent.major_version));
    writer.write_varint(u64::from(parent.minor_version));
    writer.write_varint(block.header.timestamp);
    writer.write_bytes(&parent.previous_block_hash);
    writer.write_u32_le(block.header.nonce);
    writer.write_varint(u64::from(parent.transaction_count));
    for hash in &parent.base_transaction_branch {
        writer.write_bytes(hash);
    }
    write_transaction(writer, &parent.base_transaction);
    for hash in &parent.blockchain_branch {
        writer.write_bytes(hash);
    }
}

fn read_parent_block(reader: &mut BinaryReader<'_>, header: &mut BlockHeader) -> DecodeResult<ParentBlock> {
    let major_version = reader.read_varint_u8("parent major version")?;
    let minor_version = reader.read_varint_u8("parent minor version")?;
    header.timestamp = reader.read_varint()?;
    let previous_block_hash = reader.read_hash()?;
    header.nonce = reader.read_u32_le()?;

    let transaction_count = reader.read_varint_u16("parent transaction count")?;
    if transaction_count == 0 {
        return Err(DecodeError::EmptyParentBlock);
    }
    let depth = tree_depth(usize::from(transaction_count));
    let mut base_transaction_branch = Vec::with_capacity(depth);
    for _ in 0..depth {
        base_transaction_branch.push(reader.read_hash()?);
    }

    let base_transaction = read_transaction(reader)?;

    let chain_depth = find_merge_mining_tag(&base_transaction.extra)
        .map(|tag| tag.depth)
        .unwrap_or(0);
    if chain_depth > MAX_MERGE_MINING_DEPTH {
        return Err(DecodeError::MergeMiningDepthTooLarge(chain_depth));
    }
    let mut blockchain_branch = Vec::with_capacity(chain_depth as usize);
    for _ in 0..chain_depth {
        blockchain_branch.push(reader.read_hash()?);
    }

    Ok(ParentBlock {
        major_version,
        minor_version,
        previous_block_hash,
        transaction_count,
        base_transaction_branch,
        base_transaction,
        blockchain_branch,
    })
}

pub fn write_block_header(writer: &mut BinaryWriter, block: &Block) {
    let header = &block.header;
    writer.write_varint(u64::from(header.major_version));
    writer.write_varint(u64::from(header.minor_version));
    if header.major_version == BLOCK_MAJOR_VERSION_1 {
        writer.write_varint(header.timestamp);
        writer.write_bytes(&header.previous_block_hash);
        writer.write_u32_le(header.nonce);
    } else {
        writer.write_bytes(&header.previous_block_hash);
        write_parent_block(writer, block);
    }
}

pub fn write_block(writer: &mut BinaryWriter, block: &Block) {
    write_block_header(writer, block);
    write_transaction(writer, &block.base_transaction);
    writer.write_varint(block.transaction_hashes.len() as u64);
    for hash in &block.transaction_hashes {
        writer.write_bytes(hash);
    }
}

pub fn read_block(reader: &mut BinaryReader<'_>) -> DecodeResult<Block> {
    let major_version = reader.read_varint_u8("major version")?;
    if !(BLOCK_MAJOR_VERSION_1..=BLOCK_MAJOR_VERSION_3).contains(&major_version) {
        return Err(DecodeError::UnsupportedMajorVersion(major_version));
    }
    let minor_version = reader.read_varint_u8("minor version")?;

    let mut header = BlockHeader { major_version, minor_version, ..Default::default() };
    let parent_block = if major_version == BLOCK_MAJOR_VERSION_1 {
        header.timestamp = reader.read_varint()?;
        header.previous_block_hash = reader.read_hash()?;
        header.nonce = reader.read_u32_le()?;
        ParentBlock::default()
    } else {
        header.previous_block_hash = reader.read_hash()?;
        read_parent_block(reader, &mut header)?
    };

    let base_transaction = read_transaction(reader)?;

    let hash_count = reader.read_count(32)?;
    let mut transaction_hashes = Vec::with_capacity(hash_count);
    for _ in 0..hash_count {
        transaction_hashes.push(reader.read_hash()?);
    }

    Ok(Block { header, parent_block, base_transaction, transaction_hashes })
}

pub fn serialize_block(block: &Block) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    write_block(&mut writer, block);
    writer.into_bytes()
}

/// Decode a complete block; trailing bytes are an error
pub fn deserialize_block(bytes: &[u8]) -> DecodeResult<Block> {
    let mut reader = BinaryReader::new(bytes);
    let block = read_block(&mut reader)?;
    reader.finish()?;
    Ok(block)
}

/// Serialized parent block section on its own, as measured by the size ceiling
pub fn serialize_parent_block(block: &Block) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    write_parent_block(&mut writer, block);
    writer.into_bytes()
}
