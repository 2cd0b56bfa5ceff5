//! The 96-byte fixed superblock at the start (or `offset`) of every SquashFS 4.0 image.

use bitflags::bitflags;
use std::fmt;
use std::io::Read;

use crate::error::{Result, SquashfsError};
use crate::utils::field;
use crate::{INVALID_BLK, MAGIC, SUPERBLOCK_SIZE, VERSION_MAJOR, VERSION_MINOR};

#[derive(Clone)]
pub struct Superblock([u8; SUPERBLOCK_SIZE]);

impl Superblock {
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        reader.read_exact(&mut buf)?;
        let sb = Self(buf);

        if sb.magic() != MAGIC {
            return Err(SquashfsError::format(format!(
                "bad magic: 0x{:08x}",
                sb.magic()
            )));
        }
        if sb.version_major() != VERSION_MAJOR || sb.version_minor() != VERSION_MINOR {
            return Err(SquashfsError::format(format!(
                "unsupported version {}.{}",
                sb.version_major(),
                sb.version_minor()
            )));
        }
        if sb.block_size().ilog2() != sb.block_log() as u32 {
            return Err(SquashfsError::format(format!(
                "block size {} is not 2^block_log ({})",
                sb.block_size(),
                sb.block_log()
            )));
        }
        Ok(sb)
    }

    field!(magic, u32, 0, 4);
    field!(inodes, u32, 4, 4);
    field!(mkfs_time, u32, 8, 4);
    field!(block_size, u32, 12, 4);
    field!(fragments, u32, 16, 4);
    field!(compressor, u16, 20, 2);
    field!(block_log, u16, 22, 2);

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(u16::from_le_bytes([self.0[24], self.0[25]]))
    }

    field!(no_ids, u16, 26, 2);
    field!(version_major, u16, 28, 2);
    field!(version_minor, u16, 30, 2);
    field!(root_inode, i64, 32, 8);
    field!(bytes_used, u64, 40, 8);
    field!(id_table_start, u64, 48, 8);
    field!(xattr_id_table_start, i64, 56, 8);
    field!(inode_table_start, i64, 64, 8);
    field!(directory_table_start, i64, 72, 8);
    field!(fragment_table_start, u64, 80, 8);
    field!(export_table_start, i64, 88, 8);

    pub fn has_xattrs(&self) -> bool {
        self.xattr_id_table_start() != INVALID_BLK
            && !self.flags().contains(Flags::NO_XATTRS_IN_ARCHIVE)
    }

    pub fn has_export_table(&self) -> bool {
        self.export_table_start() != INVALID_BLK
    }
}

bitflags! {
    pub struct Flags: u16 {
        const INODES_STORED_UNCOMPRESSED = 0x0001;
        const DATA_BLOCKS_STORED_UNCOMPRESSED = 0x0002;
        const CHECK = 0x0004;
        const FRAGMENTS_STORED_UNCOMPRESSED = 0x0008;
        const FRAGMENTS_ARE_NOT_USED = 0x0010;
        const FRAGMENTS_ALWAYS_GENERATED = 0x0020;
        const DATA_DEDUPLICATED = 0x0040;
        const NFSEXPORT_TABLE_EXISTS = 0x0080;
        const XATTRS_STORED_UNCOMPRESSED = 0x0100;
        const NO_XATTRS_IN_ARCHIVE = 0x0200;
        const COMPRESSOR_OPTIONS_PRESENT = 0x0400;
        const IDTABLE_UNCOMPRESSED = 0x0800;
    }
}

impl fmt::Debug for Superblock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Superblock")
            .field("inodes", &self.inodes())
            .field("block_size", &self.block_size())
            .field("fragments", &self.fragments())
            .field("compressor", &self.compressor())
            .field("flags", &self.flags())
            .field("no_ids", &self.no_ids())
            .field("root_inode", &self.root_inode())
            .field("bytes_used", &self.bytes_used())
            .field("id_table_start", &self.id_table_start())
            .field("xattr_id_table_start", &self.xattr_id_table_start())
            .field("inode_table_start", &self.inode_table_start())
            .field("directory_table_start", &self.directory_table_start())
            .field("fragment_table_start", &self.fragment_table_start())
            .field("export_table_start", &self.export_table_start())
            .finish()
    }
}
