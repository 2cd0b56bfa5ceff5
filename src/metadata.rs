//! Components E and F: the compressed metadata-block reader and the random-access metadata
//! stream built on top of it.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use tracing::trace;

use crate::compressor::Compressor;
use crate::error::{Result, SquashfsError};
use crate::superblock::Flags;
use crate::{ReadSeek, METADATA_SIZE};

const UNCOMPRESSED_BIT: u16 = 1 << 15;

/// Reads one metadata block at absolute offset `start`, returning its decompressed payload and
/// the absolute offset of the block that physically follows it.
pub fn read_metadata_block<R: ReadSeek + ?Sized>(
    reader: &mut R,
    compressor: &Compressor,
    flags: Flags,
    start: u64,
) -> Result<(Vec<u8>, u64)> {
    reader.seek(SeekFrom::Start(start))?;

    let mut header = [0u8; 2];
    reader.read_exact(&mut header)?;
    let header = u16::from_le_bytes(header);
    let uncompressed = header & UNCOMPRESSED_BIT != 0;
    let payload_size = (header & !UNCOMPRESSED_BIT) as usize;
    if payload_size > METADATA_SIZE {
        return Err(SquashfsError::format(format!(
            "metadata block at {start} claims {payload_size} bytes, exceeds {METADATA_SIZE}"
        )));
    }

    // Very old images set SQUASHFS_CHECK and carry one extra byte between the header and the
    // payload. It is never used for validation here, only skipped for compatibility.
    let header_size = if flags.contains(Flags::CHECK) { 3 } else { 2 };
    if header_size == 3 {
        let mut check = [0u8; 1];
        reader.read_exact(&mut check)?;
    }

    let mut payload = vec![0u8; payload_size];
    reader.read_exact(&mut payload)?;

    trace!(start, payload_size, uncompressed, "read metadata block");

    let data = if uncompressed {
        payload
    } else {
        compressor.uncompress(&payload, METADATA_SIZE)?
    };

    Ok((data, start + header_size as u64 + payload_size as u64))
}

struct CachedBlock {
    payload: Vec<u8>,
    next: u64,
}

/// Random access across a chain of metadata blocks, per §4.F. Two independent instances are
/// kept by the reader — one for the inode table region, one for the directory table region —
/// since a given absolute offset belongs to exactly one of the two tables.
pub struct MetadataStream {
    cache: HashMap<u64, CachedBlock>,
}

impl MetadataStream {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    fn block(
        &mut self,
        source: &mut dyn ReadSeek,
        compressor: &Compressor,
        flags: Flags,
        start: u64,
    ) -> Result<&CachedBlock> {
        if !self.cache.contains_key(&start) {
            let (payload, next) = read_metadata_block(source, compressor, flags, start)?;
            self.cache.insert(start, CachedBlock { payload, next });
        }
        Ok(self.cache.get(&start).expect("just inserted"))
    }

    /// Reads `length` bytes starting at `(block, offset)`, following the block chain as needed.
    /// Returns the bytes read along with the cursor `(block, offset)` immediately past them, so
    /// callers can resume sequential reads (e.g. to stream a file's inline block list).
    pub fn read_at(
        &mut self,
        source: &mut dyn ReadSeek,
        compressor: &Compressor,
        flags: Flags,
        mut block: u64,
        mut offset: usize,
        length: usize,
    ) -> Result<(Vec<u8>, u64, usize)> {
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            let cached = self.block(source, compressor, flags, block)?;
            if offset > cached.payload.len() {
                return Err(SquashfsError::format(format!(
                    "offset {offset} out of range for metadata block at {block} (len {})",
                    cached.payload.len()
                )));
            }
            let remaining_in_block = cached.payload.len() - offset;
            let want = (length - out.len()).min(remaining_in_block);
            out.extend_from_slice(&cached.payload[offset..offset + want]);

            if want == remaining_in_block {
                let next = cached.next;
                block = next;
                offset = 0;
            } else {
                offset += want;
            }

            if out.len() < length && remaining_in_block == 0 {
                return Err(SquashfsError::format("metadata stream exhausted before satisfying read"));
            }
        }
        Ok((out, block, offset))
    }
}

impl Default for MetadataStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stored_block(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let header = (payload.len() as u16) | UNCOMPRESSED_BIT;
        out.extend_from_slice(&header.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn reads_single_uncompressed_block() {
        let mut image = stored_block(b"hello world");
        image.extend_from_slice(&[0u8; 16]); // padding so seeks past the block don't panic
        let mut cursor = Cursor::new(image);
        let (payload, next) =
            read_metadata_block(&mut cursor, &Compressor::None, Flags::empty(), 0).unwrap();
        assert_eq!(payload, b"hello world");
        assert_eq!(next, 2 + 11);
    }

    #[test]
    fn stream_follows_chain_across_blocks() {
        let mut image = stored_block(b"0123456789");
        image.extend_from_slice(&stored_block(b"abcdefghij"));
        let mut cursor = Cursor::new(image);
        let mut stream = MetadataStream::new();

        let (bytes, block, offset) = stream
            .read_at(&mut cursor, &Compressor::None, Flags::empty(), 0, 8, 6)
            .unwrap();
        assert_eq!(bytes, b"89abcd");
        assert_eq!(block, 13); // 2-byte header + 10 bytes payload of the first block
        assert_eq!(offset, 4);
    }

    #[test]
    fn cache_hit_returns_identical_bytes() {
        let image = stored_block(b"cached-bytes");
        let mut cursor = Cursor::new(image);
        let mut stream = MetadataStream::new();
        let (first, _, _) = stream
            .read_at(&mut cursor, &Compressor::None, Flags::empty(), 0, 0, 6)
            .unwrap();
        let (second, _, _) = stream
            .read_at(&mut cursor, &Compressor::None, Flags::empty(), 0, 0, 6)
            .unwrap();
        assert_eq!(first, second);
    }
}
