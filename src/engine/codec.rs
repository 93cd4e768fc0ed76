//! SILT - Segment Codec
//! Encodes a frozen segment into the durable block artifact written to
//! the object store, and decodes it back for verification.
//!
//! ## Binary Format
//! ```text
//! [block]*                      entries grouped into ~4 KB blocks
//!   per entry:
//!     [op: 1 byte][key_len: 4 bytes LE][key: N bytes]
//!     [timestamp: 8 bytes LE][val_len: 4 bytes LE][value: M bytes]
//!   per block: [payload][crc: 4 bytes LE]
//! [index: bincode block handles][index_len: 4 bytes LE][magic: 4 bytes LE]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SiltError};
use crate::types::{Value, VersionedKey};

/// Target uncompressed payload per block.
pub const BLOCK_SIZE: usize = 4096;

const MAGIC: u32 = 0x534c_5447; // "SLTG"

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct BlockHandle {
    offset: u64,
    len: u64,
    first_key: Vec<u8>,
}

/// Encode an ordered entry stream into the durable artifact.
pub fn encode_segment(entries: impl Iterator<Item = (VersionedKey, Value)>) -> Result<Bytes> {
    let mut artifact = BytesMut::new();
    let mut handles = Vec::new();
    let mut block = BytesMut::new();
    let mut first_key: Option<Bytes> = None;

    for (versioned, value) in entries {
        if first_key.is_none() {
            first_key = Some(versioned.key.clone());
        }
        encode_entry(&mut block, &versioned, &value);
        if block.len() >= BLOCK_SIZE {
            seal_block(&mut artifact, &mut block, &mut handles, &mut first_key);
        }
    }
    if !block.is_empty() {
        seal_block(&mut artifact, &mut block, &mut handles, &mut first_key);
    }

    let index = bincode::serialize(&handles)
        .map_err(|err| SiltError::Serialization(err.to_string()))?;
    artifact.put_slice(&index);
    artifact.put_u32_le(index.len() as u32);
    artifact.put_u32_le(MAGIC);
    Ok(artifact.freeze())
}

fn encode_entry(block: &mut BytesMut, versioned: &VersionedKey, value: &Value) {
    let op = if value.is_empty() { OP_DELETE } else { OP_PUT };
    block.put_u8(op);
    block.put_u32_le(versioned.key.len() as u32);
    block.put_slice(&versioned.key);
    block.put_u64_le(versioned.timestamp);
    block.put_u32_le(value.len() as u32);
    block.put_slice(value);
}

fn seal_block(
    artifact: &mut BytesMut,
    block: &mut BytesMut,
    handles: &mut Vec<BlockHandle>,
    first_key: &mut Option<Bytes>,
) {
    let offset = artifact.len() as u64;
    let crc = crc32fast::hash(block);
    artifact.put_slice(block);
    artifact.put_u32_le(crc);
    handles.push(BlockHandle {
        offset,
        len: block.len() as u64,
        first_key: first_key.take().unwrap_or_default().to_vec(),
    });
    block.clear();
}

/// Decode a full artifact back into its entries, verifying block CRCs
/// and the trailing magic.
pub fn decode_segment(data: &[u8]) -> Result<Vec<(VersionedKey, Value)>> {
    if data.len() < 8 {
        return Err(SiltError::Corruption("artifact too short".into()));
    }
    let magic = read_u32_le(&data[data.len() - 4..]);
    if magic != MAGIC {
        return Err(SiltError::Corruption(format!(
            "bad magic {magic:#010x}"
        )));
    }
    let index_len = read_u32_le(&data[data.len() - 8..data.len() - 4]) as usize;
    let index_end = data.len() - 8;
    let index_start = index_end
        .checked_sub(index_len)
        .ok_or_else(|| SiltError::Corruption("index length out of bounds".into()))?;

    let handles: Vec<BlockHandle> = bincode::deserialize(&data[index_start..index_end])
        .map_err(|err| SiltError::Serialization(err.to_string()))?;

    let mut entries = Vec::new();
    for handle in &handles {
        let start = handle.offset as usize;
        let end = start + handle.len as usize;
        if end + 4 > index_start {
            return Err(SiltError::Corruption("block handle out of bounds".into()));
        }
        let payload = &data[start..end];
        let stored_crc = read_u32_le(&data[end..end + 4]);
        if crc32fast::hash(payload) != stored_crc {
            return Err(SiltError::Corruption(format!(
                "crc mismatch in block at offset {}",
                handle.offset
            )));
        }
        decode_block(payload, &mut entries)?;
    }
    Ok(entries)
}

fn decode_block(mut payload: &[u8], entries: &mut Vec<(VersionedKey, Value)>) -> Result<()> {
    while !payload.is_empty() {
        let (op, rest) = split_u8(payload)?;
        let (key_len, rest) = split_u32(rest)?;
        let (key, rest) = split_bytes(rest, key_len as usize)?;
        let (timestamp, rest) = split_u64(rest)?;
        let (val_len, rest) = split_u32(rest)?;
        let (value, rest) = split_bytes(rest, val_len as usize)?;

        if op != OP_PUT && op != OP_DELETE {
            return Err(SiltError::Corruption(format!("unknown op {op}")));
        }
        entries.push((
            VersionedKey::new(Bytes::copy_from_slice(key), timestamp),
            Bytes::copy_from_slice(value),
        ));
        payload = rest;
    }
    Ok(())
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn split_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&byte, rest)) => Ok((byte, rest)),
        None => Err(truncated()),
    }
}

fn split_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(truncated());
    }
    let (head, rest) = data.split_at(4);
    Ok((read_u32_le(head), rest))
}

fn split_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(truncated());
    }
    let (head, rest) = data.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    Ok((u64::from_le_bytes(raw), rest))
}

fn split_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(truncated());
    }
    Ok(data.split_at(len))
}

fn truncated() -> SiltError {
    SiltError::Corruption("truncated block entry".into())
}
