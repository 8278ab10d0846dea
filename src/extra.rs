//! Transaction `extra` field
//!
//! The extra field is a sequence of tagged sub-fields. Parsing is sequential
//! and stops at the first byte that does not start a well-formed field; the
//! fields parsed up to that point are kept, so arbitrary bytes may follow a
//! merge-mining tag.

use crate::serialization::{BinaryReader, BinaryWriter};
use crate::types::{Hash, PublicKey};
use serde::{Deserialize, Serialize};

pub const TX_EXTRA_TAG_PADDING: u8 = 0x00;
pub const TX_EXTRA_TAG_PUBKEY: u8 = 0x01;
pub const TX_EXTRA_TAG_NONCE: u8 = 0x02;
pub const TX_EXTRA_MERGE_MINING_TAG: u8 = 0x03;

/// Longest payload of a nonce field
pub const TX_EXTRA_NONCE_MAX_COUNT: usize = 255;

/// Merge-mining commitment: depth of the auxiliary-chain branch and the
/// aggregate Merkle root of the auxiliary chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMiningTag {
    pub depth: u64,
    pub merkle_root: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Padding(usize),
    PublicKey(PublicKey),
    Nonce(Vec<u8>),
    MergeMiningTag(MergeMiningTag),
}

/// Parse as many leading fields as are well formed
pub fn parse_extra(extra: &[u8]) -> Vec<ExtraField> {
    let mut fields = Vec::new();
    let mut reader = BinaryReader::new(extra);
    while reader.remaining() > 0 {
        match read_field(&mut reader) {
            Some(field) => fields.push(field),
            None => break,
        }
    }
    fields
}

fn read_field(reader: &mut BinaryReader<'_>) -> Option<ExtraField> {
    match reader.read_u8().ok()? {
        TX_EXTRA_TAG_PADDING => {
            // Padding runs to the end and must be all zeros
            let rest = reader.read_bytes(reader.remaining()).ok()?;
            if rest.iter().any(|&b| b != 0) {
                return None;
            }
            Some(ExtraField::Padding(rest.len() + 1))
        }
        TX_EXTRA_TAG_PUBKEY => reader.read_hash().ok().map(ExtraField::PublicKey),
        TX_EXTRA_TAG_NONCE => {
            let len = reader.read_u8().ok()?;
            let nonce = reader.read_bytes(usize::from(len)).ok()?;
            Some(ExtraField::Nonce(nonce.to_vec()))
        }
        TX_EXTRA_MERGE_MINING_TAG => {
            let len = reader.read_varint().ok()?;
            let body = reader.read_bytes(usize::try_from(len).ok()?).ok()?;
            let mut body_reader = BinaryReader::new(body);
            let depth = body_reader.read_varint().ok()?;
            let merkle_root = body_reader.read_hash().ok()?;
            body_reader.finish().ok()?;
            Some(ExtraField::MergeMiningTag(MergeMiningTag { depth, merkle_root }))
        }
        _ => None,
    }
}

/// First merge-mining tag of a parseable prefix, `None` when absent
pub fn find_merge_mining_tag(extra: &[u8]) -> Option<MergeMiningTag> {
    parse_extra(extra).into_iter().find_map(|field| match field {
        ExtraField::MergeMiningTag(tag) => Some(tag),
        _ => None,
    })
}

/// First transaction public key of a parseable prefix
pub fn find_public_key(extra: &[u8]) -> Option<PublicKey> {
    parse_extra(extra).into_iter().find_map(|field| match field {
        ExtraField::PublicKey(key) => Some(key),
        _ => None,
    })
}

pub fn append_public_key(extra: &mut Vec<u8>, key: &PublicKey) {
    extra.push(TX_EXTRA_TAG_PUBKEY);
    extra.extend_from_slice(key);
}

/// Append a nonce field; payloads longer than 255 bytes are truncated
pub fn append_nonce(extra: &mut Vec<u8>, nonce: &[u8]) {
    let nonce = &nonce[..nonce.len().min(TX_EXTRA_NONCE_MAX_COUNT)];
    extra.push(TX_EXTRA_TAG_NONCE);
    extra.push(nonce.len() as u8);
    extra.extend_from_slice(nonce);
}

pub fn append_merge_mining_tag(extra: &mut Vec<u8>, tag: &MergeMiningTag) {
    let mut body = BinaryWriter::new();
    body.write_varint(tag.depth);
    body.write_bytes(&tag.merkle_root);
    let body = body.into_bytes();

    let mut writer = BinaryWriter::new();
    writer.write_u8(TX_EXTRA_MERGE_MINING_TAG);
    writer.write_varint(body.len() as u64);
    writer.write_bytes(&body);
    extra.extend_from_slice(&writer.into_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> MergeMiningTag {
        MergeMiningTag { depth: 3, merkle_root: [0x5a; 32] }
    }

    #[test]
    fn test_empty_extra_has_no_tag() {
        assert!(parse_extra(&[]).is_empty());
        assert_eq!(find_merge_mining_tag(&[]), None);
    }

    #[test]
    fn test_tag_roundtrip() {
        let mut extra = Vec::new();
        append_merge_mining_tag(&mut extra, &tag());
        assert_eq!(find_merge_mining_tag(&extra), Some(tag()));
    }

    #[test]
    fn test_garbage_after_tag_is_ignored() {
        let mut extra = Vec::new();
        append_merge_mining_tag(&mut extra, &tag());
        append_nonce(&mut extra, b"0xdeadbeef");
        extra.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let fields = parse_extra(&extra);
        assert_eq!(fields.len(), 2);
        assert_eq!(find_merge_mining_tag(&extra), Some(tag()));
    }

    #[test]
    fn test_nonce_only_extra_has_no_tag() {
        let mut extra = Vec::new();
        append_nonce(&mut extra, b"0xdeadbeef");
        assert_eq!(parse_extra(&extra), vec![ExtraField::Nonce(b"0xdeadbeef".to_vec())]);
        assert_eq!(find_merge_mining_tag(&extra), None);
    }

    #[test]
    fn test_truncated_tag_is_not_a_tag() {
        let mut extra = Vec::new();
        append_merge_mining_tag(&mut extra, &tag());
        extra.truncate(extra.len() - 1);
        assert_eq!(find_merge_mining_tag(&extra), None);
    }

    #[test]
    fn test_zero_padding_after_tag() {
        let mut extra = Vec::new();
        append_public_key(&mut extra, &[1; 32]);
        append_merge_mining_tag(&mut extra, &tag());
        extra.resize(extra.len() + 40, 0);
        let fields = parse_extra(&extra);
        assert_eq!(fields.last(), Some(&ExtraField::Padding(40)));
        assert_eq!(find_public_key(&extra), Some([1; 32]));
        assert_eq!(find_merge_mining_tag(&extra), Some(tag()));
    }

    #[test]
    fn test_dirty_padding_stops_parse() {
        let extra = vec![TX_EXTRA_TAG_PADDING, 0, 0, 1];
        assert!(parse_extra(&extra).is_empty());
    }
}
