//! Component K: the directory walker.
//!
//! A directory's content is a sequence of 12-byte headers, each introducing a run of up to 256
//! 8-byte entries (plus a variable-length name) that all share the header's `start_block` and
//! base inode number.

use crate::compressor::Compressor;
use crate::error::{Result, SquashfsError};
use crate::inode::InodeType;
use crate::metadata::MetadataStream;
use crate::superblock::Flags;
use crate::ReadSeek;

const HEADER_SIZE: usize = 12;
const ENTRY_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Directory,
    Regular,
    Symlink,
    BlockDevice,
    CharacterDevice,
    Fifo,
    Socket,
}

impl EntryType {
    fn from_u16(value: u16) -> Result<Self> {
        Ok(match value {
            1 | 8 => Self::Directory,
            2 | 9 => Self::Regular,
            3 | 10 => Self::Symlink,
            4 | 11 => Self::BlockDevice,
            5 | 12 => Self::CharacterDevice,
            6 | 13 => Self::Fifo,
            7 | 14 => Self::Socket,
            other => return Err(SquashfsError::format(format!("unknown directory entry type {other}"))),
        })
    }

    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl From<InodeType> for EntryType {
    fn from(kind: InodeType) -> Self {
        match kind {
            InodeType::Directory | InodeType::LDirectory => Self::Directory,
            InodeType::Regular | InodeType::LRegular => Self::Regular,
            InodeType::Symlink | InodeType::LSymlink => Self::Symlink,
            InodeType::BlockDevice | InodeType::LBlockDevice => Self::BlockDevice,
            InodeType::CharacterDevice | InodeType::LCharacterDevice => Self::CharacterDevice,
            InodeType::Fifo | InodeType::LFifo => Self::Fifo,
            InodeType::Socket | InodeType::LSocket => Self::Socket,
        }
    }
}

/// One directory entry: a name, the entry's declared type (a hint — the inode itself is
/// authoritative), and the `(block, offset)` reference to the child's inode.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub kind: EntryType,
    pub inode_block: u64,
    pub inode_offset: usize,
    pub inode_number: i64,
}

/// Reads every entry in the directory region `(start_block, offset, size)`, in on-disk order.
///
/// `inode_table_start` is the absolute base against which each header's `start_block` (itself
/// relative to the inode table) and the stream's own `(block, offset)` cursor are both expressed;
/// both already live in the same address space as `stream`, so no translation is needed beyond
/// what `start_block + inode_table_start` performs for header-relative child references.
pub fn read_directory(
    source: &mut dyn ReadSeek,
    compressor: &Compressor,
    flags: Flags,
    stream: &mut MetadataStream,
    inode_table_start: u64,
    start_block: u64,
    offset: u16,
    size: u32,
) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut remaining = size as i64;
    let mut cur_block = start_block;
    let mut cur_offset = offset as usize;

    while remaining > 0 {
        let (header, b, o) = stream.read_at(
            source,
            compressor,
            flags,
            cur_block,
            cur_offset,
            HEADER_SIZE,
        )?;
        cur_block = b;
        cur_offset = o;
        remaining -= HEADER_SIZE as i64;

        let count = u32::from_le_bytes(header[0..4].try_into().unwrap()) + 1;
        let header_start_block = u32::from_le_bytes(header[4..8].try_into().unwrap());
        let base_inode_number = i32::from_le_bytes(header[8..12].try_into().unwrap());

        for _ in 0..count {
            let (fixed, b, o) = stream.read_at(
                source,
                compressor,
                flags,
                cur_block,
                cur_offset,
                ENTRY_SIZE,
            )?;
            cur_block = b;
            cur_offset = o;
            remaining -= ENTRY_SIZE as i64;

            let entry_offset = u16::from_le_bytes(fixed[0..2].try_into().unwrap());
            let inode_number_delta = i16::from_le_bytes(fixed[2..4].try_into().unwrap());
            let raw_type = u16::from_le_bytes(fixed[4..6].try_into().unwrap());
            let name_size = u16::from_le_bytes(fixed[6..8].try_into().unwrap()) as usize + 1;

            let (name, b, o) =
                stream.read_at(source, compressor, flags, cur_block, cur_offset, name_size)?;
            cur_block = b;
            cur_offset = o;
            remaining -= name_size as i64;

            entries.push(DirEntry {
                name,
                kind: EntryType::from_u16(raw_type)?,
                inode_block: inode_table_start + header_start_block as u64,
                inode_offset: entry_offset as usize,
                inode_number: base_inode_number as i64 + inode_number_delta as i64,
            });
        }
    }

    if remaining != 0 {
        return Err(SquashfsError::format(format!(
            "directory region size mismatch, {remaining} bytes unaccounted for"
        )));
    }

    Ok(entries)
}
