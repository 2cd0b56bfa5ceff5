//! Component Q: scans a byte source for candidate superblocks.
//!
//! Useful against raw flash dumps or multi-image blobs where a SquashFS image's offset is not
//! known ahead of time. Reads in fixed-size chunks with a small carry-over buffer so a magic
//! sequence straddling a chunk boundary is never missed.

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::compressor::Compressor;
use crate::error::Result;
use crate::superblock::Superblock;
use crate::{ReadSeek, MAGIC, SUPERBLOCK_SIZE};

pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Scans `source` from its current position to EOF for `hsqs` magic, validating each candidate
/// as a real superblock. Returns `(absolute_offset, Superblock)` pairs in ascending order.
pub fn scan_superblocks(source: &mut dyn ReadSeek, chunk_size: usize) -> Result<Vec<(u64, Superblock)>> {
    let magic = MAGIC.to_le_bytes();
    let mut hits = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut buffer_base = source.stream_position()?;
    let mut chunk = vec![0u8; chunk_size.max(magic.len())];

    loop {
        let read = source.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let mut i = 0;
        while i + magic.len() <= buffer.len() {
            if buffer[i..i + magic.len()] == magic {
                let offset = buffer_base + i as u64;
                if let Some(sb) = try_superblock(source, offset)? {
                    debug!(offset, "candidate superblock validated");
                    hits.push((offset, sb));
                }
            }
            i += 1;
        }

        let keep = magic.len() - 1;
        if buffer.len() > keep {
            let drop = buffer.len() - keep;
            buffer.drain(0..drop);
            buffer_base += drop as u64;
        }

        if read < chunk.len() {
            break;
        }
    }

    Ok(hits)
}

fn try_superblock(source: &mut dyn ReadSeek, offset: u64) -> Result<Option<Superblock>> {
    let saved = source.stream_position()?;
    source.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    let ok = source.read_exact(&mut buf).is_ok();
    source.seek(SeekFrom::Start(saved))?;
    if !ok {
        return Ok(None);
    }
    let Some(sb) = Superblock::read(&mut &buf[..]).ok() else {
        return Ok(None);
    };
    // `Superblock::read` validates magic, version, and block-size-vs-block-log, but not the
    // compression id; a random chunk of data can still satisfy all three by chance, so check it
    // here too, without consuming any compressor-options bytes from `source`.
    let mut empty = std::io::Cursor::new([0u8; 0]);
    if Compressor::new(sb.compressor(), crate::superblock::Flags::empty(), &mut empty).is_err() {
        return Ok(None);
    }
    Ok(Some(sb))
}
