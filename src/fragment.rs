//! Component H: the fragment table, a directory of shared tail blocks indexed by fragment id.

use std::io::{Read, Seek, SeekFrom};
use std::mem::size_of;

use crate::compressor::Compressor;
use crate::error::Result;
use crate::metadata::read_metadata_block;
use crate::superblock::{Flags, Superblock};
use crate::utils::{ceil_div, field};
use crate::{ReadSeek, METADATA_SIZE};

pub const FRAGMENT_ENTRY_SIZE: usize = 16;
const POINTER_SIZE: usize = size_of::<u64>();

#[derive(Clone, Copy)]
pub struct FragmentEntry([u8; FRAGMENT_ENTRY_SIZE]);

impl FragmentEntry {
    field!(start_block, u64, 0, 8);
    field!(size, u32, 8, 4);
    field!(unused, u32, 12, 4);
}

impl std::fmt::Debug for FragmentEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentEntry")
            .field("start_block", &self.start_block())
            .field("size", &self.size())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FragmentTable(Vec<FragmentEntry>);

impl FragmentTable {
    pub fn read(
        source: &mut dyn ReadSeek,
        compressor: &Compressor,
        flags: Flags,
        superblock: &Superblock,
        offset: u64,
    ) -> Result<Self> {
        let count = superblock.fragments() as usize;
        if count == 0 {
            return Ok(Self(Vec::new()));
        }

        let total_bytes = count * FRAGMENT_ENTRY_SIZE;
        let num_blocks = ceil_div(total_bytes as u64, METADATA_SIZE as u64) as usize;

        source.seek(SeekFrom::Start(offset + superblock.fragment_table_start()))?;
        let mut pointers = Vec::with_capacity(num_blocks);
        for _ in 0..num_blocks {
            let mut buf = [0u8; POINTER_SIZE];
            source.read_exact(&mut buf)?;
            pointers.push(offset + u64::from_le_bytes(buf));
        }

        let mut raw = Vec::with_capacity(total_bytes);
        for (i, &ptr) in pointers.iter().enumerate() {
            let (payload, _) = read_metadata_block(source, compressor, flags, ptr)?;
            let want = if i + 1 == num_blocks {
                total_bytes - raw.len()
            } else {
                METADATA_SIZE
            };
            raw.extend_from_slice(&payload[..want.min(payload.len())]);
        }

        let entries = raw
            .chunks_exact(FRAGMENT_ENTRY_SIZE)
            .map(|c| FragmentEntry(c.try_into().unwrap()))
            .collect();
        Ok(Self(entries))
    }

    pub fn get(&self, index: u32) -> Option<&FragmentEntry> {
        self.0.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
