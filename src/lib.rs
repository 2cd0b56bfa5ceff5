//! A read-only reader for SquashFS 4.0 little-endian filesystem images.
//!
//! Given any seekable byte source, [`Squashfs`] decodes the superblock, walks the compressed
//! metadata streams, and exposes the image's directory tree, inode metadata, extended
//! attributes, and file content. Writing or modifying images is out of scope; so are versions
//! other than 4.0 little-endian.

// sqsh in binary
pub const MAGIC: u32 = 0x7371_7368;
pub const SUPERBLOCK_SIZE: usize = 96;
pub const METADATA_SIZE: usize = 8 * 1024;

pub const VERSION_MAJOR: u16 = 4;
pub const VERSION_MINOR: u16 = 0;

pub const INVALID_BLK: i64 = -1;
pub const INVALID_XATTR: u32 = 0xffff_ffff;
pub const INVALID_FRAG: u32 = 0xffff_ffff;

use std::io::{Read, Seek};

/// Anything that can be read from and seeked within; the sole requirement on a byte source.
pub trait ReadSeek: Read + Seek {}
impl<RS: Read + Seek> ReadSeek for RS {}

pub mod compressor;
pub mod data;
pub mod dir;
pub mod error;
pub mod file;
pub mod fragment;
pub mod id;
pub mod inode;
pub mod metadata;
pub mod scan;
pub mod squashfs;
pub mod superblock;
pub mod tree;
pub(crate) mod utils;
pub mod xattr;

pub use error::{Result, SquashfsError};
pub use inode::Inode;
pub use squashfs::Squashfs;
pub use tree::{Directory, Node};
pub use xattr::XattrKey;
