//! Component I: the xattr id directory and the flat xattr value region it indexes.
//!
//! Absent in most images (`xattr_id_table_start == 0xFFFFFFFFFFFFFFFF`). When present, an inode's
//! `xattr` field is an index into a small fixed-size entry table; each entry packs a reference
//! into the assembled value buffer plus a count of key/value pairs and their total byte size.

use std::io::{Read, Seek, SeekFrom};
use std::mem::size_of;

use crate::compressor::Compressor;
use crate::error::{Result, SquashfsError};
use crate::metadata::read_metadata_block;
use crate::superblock::{Flags, Superblock};
use crate::utils::{ceil_div, field};
use crate::{ReadSeek, INVALID_BLK, METADATA_SIZE};

const XATTR_ID_ENTRY_SIZE: usize = 16;
const XATTR_HEADER_SIZE: usize = 16;
const POINTER_SIZE: usize = size_of::<u64>();

const PREFIX_MASK: u16 = 0x00ff;
const OOL_FLAG: u16 = 0x0100;

#[derive(Clone, Copy)]
struct XattrIdEntry([u8; XATTR_ID_ENTRY_SIZE]);

impl XattrIdEntry {
    field!(xattr, u64, 0, 8);
    field!(count, u32, 8, 4);
    field!(size, u32, 12, 4);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XattrKey {
    User(String),
    Trusted(String),
    Security(String),
}

impl std::fmt::Display for XattrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(n) => write!(f, "user.{n}"),
            Self::Trusted(n) => write!(f, "trusted.{n}"),
            Self::Security(n) => write!(f, "security.{n}"),
        }
    }
}

impl XattrKey {
    fn from_prefix(prefix: u16, name: String) -> Result<Self> {
        match prefix {
            0 => Ok(Self::User(name)),
            1 => Ok(Self::Trusted(name)),
            2 => Ok(Self::Security(name)),
            other => Err(SquashfsError::format(format!("unknown xattr prefix {other}"))),
        }
    }
}

#[derive(Debug, Default)]
pub enum XattrTables {
    #[default]
    None,
    Present {
        ids: Vec<XattrIdEntryOwned>,
        values: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct XattrIdEntryOwned {
    xattr: u64,
    count: u32,
    #[allow(dead_code)]
    size: u32,
}

impl XattrTables {
    pub fn read(
        source: &mut dyn ReadSeek,
        compressor: &Compressor,
        flags: Flags,
        superblock: &Superblock,
        offset: u64,
    ) -> Result<Self> {
        let table_start = superblock.xattr_id_table_start();
        if table_start == INVALID_BLK || !superblock.has_xattrs() {
            return Ok(Self::None);
        }
        let table_start = offset + table_start as u64;

        source.seek(SeekFrom::Start(table_start))?;
        let mut header = [0u8; XATTR_HEADER_SIZE];
        source.read_exact(&mut header)?;
        let values_start = offset + u64::from_le_bytes(header[0..8].try_into().unwrap());
        let num_ids = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;

        if num_ids == 0 {
            return Ok(Self::None);
        }

        let total_id_bytes = num_ids * XATTR_ID_ENTRY_SIZE;
        let num_id_blocks = ceil_div(total_id_bytes as u64, METADATA_SIZE as u64) as usize;

        let mut pointers = Vec::with_capacity(num_id_blocks);
        for _ in 0..num_id_blocks {
            let mut buf = [0u8; POINTER_SIZE];
            source.read_exact(&mut buf)?;
            pointers.push(offset + u64::from_le_bytes(buf));
        }

        let mut raw_ids = Vec::with_capacity(total_id_bytes);
        for (i, &ptr) in pointers.iter().enumerate() {
            let (payload, _) = read_metadata_block(source, compressor, flags, ptr)?;
            let want = if i + 1 == num_id_blocks {
                total_id_bytes - raw_ids.len()
            } else {
                METADATA_SIZE
            };
            raw_ids.extend_from_slice(&payload[..want.min(payload.len())]);
        }

        let ids: Vec<XattrIdEntryOwned> = raw_ids
            .chunks_exact(XATTR_ID_ENTRY_SIZE)
            .map(|c| {
                let e = XattrIdEntry(c.try_into().unwrap());
                XattrIdEntryOwned {
                    xattr: e.xattr(),
                    count: e.count(),
                    size: e.size(),
                }
            })
            .collect();

        // The value region's first block boundary past which no more value data exists is the
        // start of the first xattr-id metadata block (or the id table header itself, when there
        // are no id blocks -- which cannot happen here since num_ids > 0).
        let region_end = pointers.first().copied().unwrap_or(table_start);

        let mut values = Vec::new();
        let mut cursor = values_start;
        while cursor < region_end {
            let (payload, next) = read_metadata_block(source, compressor, flags, cursor)?;
            let mut padded = payload;
            padded.resize(METADATA_SIZE, 0);
            values.extend_from_slice(&padded);
            cursor = next;
        }

        Ok(Self::Present { ids, values })
    }

    /// Resolves the key/value pairs named by an inode's xattr index.
    pub fn resolve(&self, xattr_index: u32) -> Result<Vec<(XattrKey, Vec<u8>)>> {
        let (ids, values) = match self {
            Self::None => return Ok(Vec::new()),
            Self::Present { ids, values } => (ids, values),
        };
        let entry = ids
            .get(xattr_index as usize)
            .ok_or_else(|| SquashfsError::format(format!("xattr index {xattr_index} out of range")))?;

        let mut pos = xattr_flat_offset(entry.xattr);
        let mut out = Vec::with_capacity(entry.count as usize);
        for _ in 0..entry.count {
            let (key, next, out_of_line) = read_xattr_entry(values, pos)?;
            let (val, next) = read_xattr_value(values, next, out_of_line)?;
            out.push((key, val));
            pos = next;
        }
        Ok(out)
    }
}

/// The stored 48-bit xattr/inode reference packs `(block << 16) | offset`, but unlike inode and
/// directory references, `block` here is an *uncompressed* byte offset into the assembled value
/// buffer (always a multiple of 8192), which is exactly why that buffer is padded per-block.
fn xattr_flat_offset(packed: u64) -> usize {
    let block = (packed >> 16) as usize;
    let offset = (packed & 0xffff) as usize;
    block + offset
}

/// Reads one `squashfs_xattr_entry` (name) starting at `pos`; returns the decoded key, the
/// offset of the value record that follows it, and whether that value is out-of-line.
fn read_xattr_entry(values: &[u8], pos: usize) -> Result<(XattrKey, usize, bool)> {
    let header = values
        .get(pos..pos + 4)
        .ok_or_else(|| SquashfsError::format("xattr entry out of range"))?;
    let kind = u16::from_le_bytes([header[0], header[1]]);
    let name_size = u16::from_le_bytes([header[2], header[3]]) as usize;
    let name_start = pos + 4;
    let name_bytes = values
        .get(name_start..name_start + name_size)
        .ok_or_else(|| SquashfsError::format("xattr name out of range"))?;
    let name = String::from_utf8_lossy(name_bytes).into_owned();
    let key = XattrKey::from_prefix(kind & PREFIX_MASK, name)?;
    Ok((key, name_start + name_size, kind & OOL_FLAG != 0))
}

/// Reads one `squashfs_xattr_val` starting at `pos`. An out-of-line value stores, instead of the
/// bytes themselves, an 8-byte reference (same `block << 16 | offset` scheme as the xattr-id
/// entries) to where the real `{size, bytes}` record lives in the value buffer.
fn read_xattr_value(values: &[u8], pos: usize, out_of_line: bool) -> Result<(Vec<u8>, usize)> {
    let header = values
        .get(pos..pos + 4)
        .ok_or_else(|| SquashfsError::format("xattr value out of range"))?;
    let vsize = u32::from_le_bytes(header.try_into().unwrap()) as usize;
    let data_start = pos + 4;

    if out_of_line {
        let ool_ref = values
            .get(data_start..data_start + 8)
            .ok_or_else(|| SquashfsError::format("xattr ool reference out of range"))?;
        let real_pos = xattr_flat_offset(u64::from_le_bytes(ool_ref.try_into().unwrap()));
        let (data, _) = read_xattr_value(values, real_pos, false)?;
        return Ok((data, data_start + 8));
    }

    let data = values
        .get(data_start..data_start + vsize)
        .ok_or_else(|| SquashfsError::format("xattr value data out of range"))?
        .to_vec();
    Ok((data, data_start + vsize))
}
