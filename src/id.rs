//! Component G: the uid/gid lookup table.
//!
//! A two-level structure: a flat index of 8-byte metadata-block pointers (read directly, not
//! themselves compressed), followed by metadata blocks each packing up to 2048 little-endian
//! 4-byte ids.

use std::io::{Read, Seek, SeekFrom};
use std::mem::size_of;

use crate::compressor::Compressor;
use crate::error::Result;
use crate::metadata::read_metadata_block;
use crate::superblock::{Flags, Superblock};
use crate::utils::ceil_div;
use crate::{ReadSeek, METADATA_SIZE};

const ID_SIZE: usize = size_of::<u32>();
const POINTER_SIZE: usize = size_of::<u64>();

#[derive(Debug, Default, Clone)]
pub struct IdTable(Vec<u32>);

impl IdTable {
    #[cfg(test)]
    pub(crate) fn from_raw(ids: Vec<u32>) -> Self {
        Self(ids)
    }

    pub fn read(
        source: &mut dyn ReadSeek,
        compressor: &Compressor,
        flags: Flags,
        superblock: &Superblock,
        offset: u64,
    ) -> Result<Self> {
        let no_ids = superblock.no_ids() as usize;
        if no_ids == 0 {
            return Ok(Self(Vec::new()));
        }

        let total_bytes = no_ids * ID_SIZE;
        let num_blocks = ceil_div(total_bytes as u64, METADATA_SIZE as u64) as usize;

        source.seek(SeekFrom::Start(offset + superblock.id_table_start()))?;
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

        let ids = raw
            .chunks_exact(ID_SIZE)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Ok(Self(ids))
    }

    pub fn get(&self, index: u16) -> Option<u32> {
        self.0.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
