//! Component M: streams a regular file's content from its inode's block list and, if present,
//! its fragment tail.
//!
//! A block-list entry is a packed 32-bit size word identical in shape to the one `DataBlockReader`
//! already expects (bit 24 = stored flag); a zero-sized entry is a sparse hole and is expanded to
//! `block_size` zero bytes without touching the data source at all.

use crate::compressor::Compressor;
use crate::data::DataBlockReader;
use crate::error::Result;
use crate::fragment::FragmentTable;
use crate::inode::{BlockListCursor, Inode, InodeVariant};
use crate::metadata::MetadataStream;
use crate::ReadSeek;

struct FileLayout {
    start_block: u64,
    file_size: u64,
    fragment: u32,
    frag_offset: u32,
    block_list: BlockListCursor,
}

fn layout(inode: &Inode) -> Option<FileLayout> {
    match &inode.variant {
        InodeVariant::Regular {
            start_block,
            fragment,
            frag_offset,
            file_size,
            block_list,
        } => Some(FileLayout {
            start_block: *start_block as u64,
            file_size: *file_size,
            fragment: *fragment,
            frag_offset: *frag_offset,
            block_list: *block_list,
        }),
        InodeVariant::LRegular {
            start_block,
            file_size,
            fragment,
            frag_offset,
            block_list,
            ..
        } => Some(FileLayout {
            start_block: *start_block,
            file_size: *file_size,
            fragment: *fragment,
            frag_offset: *frag_offset,
            block_list: *block_list,
        }),
        _ => None,
    }
}

/// Reads the full content of a regular file. `inode_table_start` lets the block list (stored as
/// an inode-table metadata-stream cursor) be read via `inode_stream`.
#[allow(clippy::too_many_arguments)]
pub fn read_file(
    source: &mut dyn ReadSeek,
    compressor: &Compressor,
    flags: crate::superblock::Flags,
    block_size: u32,
    inode_stream: &mut MetadataStream,
    data: &mut DataBlockReader,
    fragments: &FragmentTable,
    inode: &Inode,
    offset: u64,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in iter_file(source, compressor, flags, block_size, inode_stream, data, fragments, inode, offset) {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// Lazily streams a regular file's content one block (or the fragment tail) at a time, in order.
/// `offset` is the byte position at which the enclosing image starts within `source`; block-list
/// and fragment-table positions are stored relative to the image and must be shifted by it before
/// use as real seek positions.
#[allow(clippy::too_many_arguments)]
pub fn iter_file<'a>(
    source: &'a mut dyn ReadSeek,
    compressor: &'a Compressor,
    flags: crate::superblock::Flags,
    block_size: u32,
    inode_stream: &'a mut MetadataStream,
    data: &'a mut DataBlockReader,
    fragments: &'a FragmentTable,
    inode: &Inode,
    offset: u64,
) -> FileBlockIter<'a> {
    let layout = layout(inode);
    FileBlockIter {
        source,
        compressor,
        flags,
        block_size,
        inode_stream,
        data,
        fragments,
        layout,
        next_block: 0,
        cursor: layout.as_ref().map(|l| (l.block_list.block, l.block_list.offset)),
        offset_in_file: 0,
        data_offset: 0,
        done_fragment: false,
        image_offset: offset,
    }
}

pub struct FileBlockIter<'a> {
    source: &'a mut dyn ReadSeek,
    compressor: &'a Compressor,
    flags: crate::superblock::Flags,
    block_size: u32,
    inode_stream: &'a mut MetadataStream,
    data: &'a mut DataBlockReader,
    fragments: &'a FragmentTable,
    layout: Option<FileLayout>,
    next_block: u64,
    cursor: Option<(u64, usize)>,
    offset_in_file: u64,
    /// Running sum of previous blocks' on-disk (compressed) sizes, since blocks are packed back
    /// to back starting at `start_block` and a block-list entry carries only its own size.
    data_offset: u64,
    done_fragment: bool,
    /// Byte position at which the image starts within `source`.
    image_offset: u64,
}

impl<'a> Iterator for FileBlockIter<'a> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = self.layout.as_ref()?;

        if self.next_block < layout.block_list.blocks {
            let (cur_block, cur_offset) = self.cursor?;
            let read = self.inode_stream.read_at(
                self.source,
                self.compressor,
                self.flags,
                cur_block,
                cur_offset,
                4,
            );
            let (bytes, next_block, next_offset) = match read {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };
            self.cursor = Some((next_block, next_offset));
            self.next_block += 1;

            let size = u32::from_le_bytes(bytes.try_into().unwrap());
            let remaining_in_file = layout.file_size - self.offset_in_file;
            let expect = (self.block_size as u64).min(remaining_in_file) as usize;

            // The invalid-fragment sentinel also appears as a bare block-list entry in some
            // images; such an entry carries no data of its own and is simply skipped.
            if size == u32::MAX {
                return self.next();
            }

            if size == 0 {
                self.offset_in_file += expect as u64;
                return Some(Ok(vec![0u8; expect]));
            }

            let on_disk_size = (size & !(1u32 << 24)) as u64;
            let start = self.image_offset + layout.start_block + self.data_offset;
            self.data_offset += on_disk_size;
            self.offset_in_file += expect as u64;
            // `expect`, not `self.block_size`: a file's last block decompresses to fewer than
            // `block_size` bytes, and lzo/lz4/zstd need the exact expected output length.
            let out = self
                .data
                .read(self.source, self.compressor, start, size, expect as u32);
            return Some(out);
        }

        if layout.block_list.frag_bytes > 0 && !self.done_fragment {
            self.done_fragment = true;
            let entry = match self.fragments.get(layout.fragment) {
                Some(e) => e,
                None => {
                    return Some(Err(crate::error::SquashfsError::format(
                        "fragment index out of range",
                    )))
                }
            };
            let read = self.data.read(
                self.source,
                self.compressor,
                self.image_offset + entry.start_block(),
                entry.size(),
                self.block_size,
            );
            return Some(read.map(|full| {
                let start = layout.frag_offset as usize;
                let end = start + layout.block_list.frag_bytes as usize;
                full[start..end.min(full.len())].to_vec()
            }));
        }

        None
    }
}
