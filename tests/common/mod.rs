//! Byte-level building blocks for the hand-built SquashFS images the integration tests in this
//! directory open through the real public API. Each test still assembles its own image byte by
//! byte and tracks region offsets itself; this module only holds the small binary encoders that
//! would otherwise be copy-pasted into every test, mirroring the `stored_block` helpers already
//! duplicated across the crate's own unit tests.

use squashfs::{INVALID_BLK, MAGIC, VERSION_MAJOR, VERSION_MINOR};

/// Wraps `payload` in a stored (uncompressed) metadata-block header: a 2-byte length with the
/// top bit set, per `metadata::read_metadata_block`.
pub fn stored_metadata_block(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let header = (payload.len() as u16) | (1 << 15);
    out.extend_from_slice(&header.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// The fields of a 96-byte superblock this test pack actually varies; everything else (mkfs_time,
/// export_table_start, ...) is zero or the "absent" sentinel.
#[derive(Default)]
pub struct SuperblockFields {
    pub inodes: u32,
    pub block_size: u32,
    pub fragments: u32,
    pub compressor: u16,
    pub flags: u16,
    pub no_ids: u16,
    pub root_inode: i64,
    pub bytes_used: u64,
    pub id_table_start: u64,
    pub xattr_id_table_start: i64,
    pub inode_table_start: u64,
    pub directory_table_start: u64,
    pub fragment_table_start: u64,
}

pub fn superblock_bytes(f: &SuperblockFields) -> [u8; 96] {
    let mut buf = [0u8; 96];
    buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&f.inodes.to_le_bytes());
    buf[12..16].copy_from_slice(&f.block_size.to_le_bytes());
    buf[16..20].copy_from_slice(&f.fragments.to_le_bytes());
    buf[20..22].copy_from_slice(&f.compressor.to_le_bytes());
    buf[22..24].copy_from_slice(&(f.block_size.ilog2() as u16).to_le_bytes());
    buf[24..26].copy_from_slice(&f.flags.to_le_bytes());
    buf[26..28].copy_from_slice(&f.no_ids.to_le_bytes());
    buf[28..30].copy_from_slice(&VERSION_MAJOR.to_le_bytes());
    buf[30..32].copy_from_slice(&VERSION_MINOR.to_le_bytes());
    buf[32..40].copy_from_slice(&f.root_inode.to_le_bytes());
    buf[40..48].copy_from_slice(&f.bytes_used.to_le_bytes());
    buf[48..56].copy_from_slice(&f.id_table_start.to_le_bytes());
    buf[56..64].copy_from_slice(&f.xattr_id_table_start.to_le_bytes());
    buf[64..72].copy_from_slice(&f.inode_table_start.to_le_bytes());
    buf[72..80].copy_from_slice(&f.directory_table_start.to_le_bytes());
    buf[80..88].copy_from_slice(&f.fragment_table_start.to_le_bytes());
    buf[88..96].copy_from_slice(&(INVALID_BLK as u64).to_le_bytes());
    buf
}

/// The 16-byte common inode header shared by every inode type.
pub fn common_header(kind: u16, mode: u16, uid_index: u16, gid_index: u16, inode_number: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&kind.to_le_bytes());
    b.extend_from_slice(&mode.to_le_bytes());
    b.extend_from_slice(&uid_index.to_le_bytes());
    b.extend_from_slice(&gid_index.to_le_bytes());
    b.extend_from_slice(&0u32.to_le_bytes()); // mtime
    b.extend_from_slice(&inode_number.to_le_bytes());
    b
}

/// A basic (non-large) directory inode's 16-byte body.
pub fn dir_inode_body(start_block: u32, nlink: u32, content_size: u16, offset: u16, parent_inode: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&start_block.to_le_bytes());
    b.extend_from_slice(&nlink.to_le_bytes());
    b.extend_from_slice(&(content_size + 3).to_le_bytes());
    b.extend_from_slice(&offset.to_le_bytes());
    b.extend_from_slice(&parent_inode.to_le_bytes());
    b
}

/// A basic (non-large) regular-file inode's 16-byte body.
pub fn regular_inode_body(start_block: u32, fragment: u32, frag_offset: u32, file_size: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&start_block.to_le_bytes());
    b.extend_from_slice(&fragment.to_le_bytes());
    b.extend_from_slice(&frag_offset.to_le_bytes());
    b.extend_from_slice(&file_size.to_le_bytes());
    b
}

/// An `LSymlink` inode's variable-length body (nlink, target, xattr index).
pub fn lsymlink_inode_body(nlink: u32, target: &[u8], xattr: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&nlink.to_le_bytes());
    b.extend_from_slice(&(target.len() as u32).to_le_bytes());
    b.extend_from_slice(target);
    b.extend_from_slice(&xattr.to_le_bytes());
    b
}

/// A directory region's 12-byte entry-run header.
pub fn dir_header(count_minus_one: u32, start_block: u32, base_inode_number: i32) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&count_minus_one.to_le_bytes());
    b.extend_from_slice(&start_block.to_le_bytes());
    b.extend_from_slice(&base_inode_number.to_le_bytes());
    b
}

/// One fixed-size (8-byte header, variable name) directory entry.
pub fn dir_entry(offset: u16, inode_number_delta: i16, raw_type: u16, name: &[u8]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&offset.to_le_bytes());
    b.extend_from_slice(&inode_number_delta.to_le_bytes());
    b.extend_from_slice(&raw_type.to_le_bytes());
    b.extend_from_slice(&((name.len() - 1) as u16).to_le_bytes());
    b.extend_from_slice(name);
    b
}

/// A block-list entry's packed 32-bit size word (bit 24 = stored/uncompressed flag).
pub fn block_list_entry(size: u32, stored: bool) -> [u8; 4] {
    let v = if stored { size | (1 << 24) } else { size };
    v.to_le_bytes()
}

pub const SPARSE_BLOCK_ENTRY: [u8; 4] = [0, 0, 0, 0];

/// Builds a complete, uncompressed single-file image: `/` containing one regular file `name`
/// with `content`, small enough to fit in a single block. Used both as the plain no-compression
/// fixture and, prefixed with padding, as the embedded-offset fixture — the same bytes are
/// expected to behave identically regardless of where they start within their host source.
pub fn minimal_single_file_image(name: &[u8], content: &[u8]) -> Vec<u8> {
    const BLOCK_SIZE: u32 = 128;

    let mut image = vec![0u8; 96];

    let data_start = image.len() as u64;
    image.extend_from_slice(content);

    let inode_table_start = image.len() as u64;
    let root_body_len = 16 + 16; // common header + dir_inode_body
    let dir_content_len = 12 + 8 + name.len(); // header + entry fixed part + name
    let root = [
        common_header(1, 0o755, 0, 0, 1),
        dir_inode_body(0, 2, dir_content_len as u16, 0, 1),
    ]
    .concat();
    let child = [
        common_header(2, 0o644, 0, 0, 2),
        regular_inode_body(data_start as u32, 0xffff_ffff, 0, content.len() as u32),
        block_list_entry(content.len() as u32, true).to_vec(),
    ]
    .concat();
    assert_eq!(root.len(), root_body_len);
    let inode_payload = [root, child].concat();
    image.extend_from_slice(&stored_metadata_block(&inode_payload));

    let directory_table_start = image.len() as u64;
    let dir_payload = [
        dir_header(0, 0, 2),
        dir_entry(root_body_len as u16, 0, 2, name),
    ]
    .concat();
    image.extend_from_slice(&stored_metadata_block(&dir_payload));

    let id_table_start = image.len() as u64;
    let id_block_pos = id_table_start + 8;
    image.extend_from_slice(&id_block_pos.to_le_bytes());
    image.extend_from_slice(&stored_metadata_block(&0u32.to_le_bytes()));

    let bytes_used = image.len() as u64;
    let fields = SuperblockFields {
        inodes: 2,
        block_size: BLOCK_SIZE,
        fragments: 0,
        compressor: 0,
        flags: 0,
        no_ids: 1,
        root_inode: 0,
        bytes_used,
        id_table_start,
        xattr_id_table_start: INVALID_BLK,
        inode_table_start,
        directory_table_start,
        fragment_table_start: 0,
    };
    image[0..96].copy_from_slice(&superblock_bytes(&fields));
    image
}
