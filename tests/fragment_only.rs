//! A file smaller than the block size, stored entirely as a fragment tail rather than a full
//! block. The fragment block also carries leading padding bytes ahead of this file's own tail, so
//! a nonzero `frag_offset` has to pick the right slice out of the shared fragment data.

mod common;

use std::io::Cursor;

use squashfs::{Node, Squashfs};

#[test]
fn reads_fragment_tail_at_nonzero_offset() {
    const BLOCK_SIZE: u32 = 128;
    const NAME: &[u8] = b"tailfile";
    const FRAG_OFFSET: u32 = 5;

    let fragment_block = b"XXXXXtail";
    let expected_content = b"tail";

    let mut image = vec![0u8; 96];

    let frag_start = image.len() as u64;
    image.extend_from_slice(fragment_block);

    let inode_table_start = image.len() as u64;
    let root_body_len = 32u16;
    let dir_content_len = 12 + 8 + NAME.len();
    let root = [
        common::common_header(1, 0o755, 0, 0, 1),
        common::dir_inode_body(0, 2, dir_content_len as u16, 0, 1),
    ]
    .concat();
    // block_list.blocks == 0 for this file, so no block-list entry follows the fixed body.
    let child = [
        common::common_header(2, 0o644, 0, 0, 2),
        common::regular_inode_body(0, 0, FRAG_OFFSET, expected_content.len() as u32),
    ]
    .concat();
    let inode_payload = [root, child].concat();
    image.extend_from_slice(&common::stored_metadata_block(&inode_payload));

    let directory_table_start = image.len() as u64;
    let dir_payload = [
        common::dir_header(0, 0, 2),
        common::dir_entry(root_body_len, 0, 2, NAME),
    ]
    .concat();
    image.extend_from_slice(&common::stored_metadata_block(&dir_payload));

    let id_table_start = image.len() as u64;
    let id_block_pos = id_table_start + 8;
    image.extend_from_slice(&id_block_pos.to_le_bytes());
    image.extend_from_slice(&common::stored_metadata_block(&0u32.to_le_bytes()));

    let fragment_table_start = image.len() as u64;
    let fragment_entry_block_pos = fragment_table_start + 8;
    image.extend_from_slice(&fragment_entry_block_pos.to_le_bytes());
    let mut fragment_entry = Vec::new();
    fragment_entry.extend_from_slice(&frag_start.to_le_bytes()); // start_block
    let stored_size = (fragment_block.len() as u32) | (1 << 24);
    fragment_entry.extend_from_slice(&stored_size.to_le_bytes()); // size
    fragment_entry.extend_from_slice(&0u32.to_le_bytes()); // unused
    image.extend_from_slice(&common::stored_metadata_block(&fragment_entry));

    let bytes_used = image.len() as u64;
    let fields = common::SuperblockFields {
        inodes: 2,
        block_size: BLOCK_SIZE,
        fragments: 1,
        compressor: 0,
        flags: 0,
        no_ids: 1,
        root_inode: 0,
        bytes_used,
        id_table_start,
        xattr_id_table_start: squashfs::INVALID_BLK,
        inode_table_start,
        directory_table_start,
        fragment_table_start,
    };
    image[0..96].copy_from_slice(&common::superblock_bytes(&fields));

    let fs = Squashfs::open(Cursor::new(image), 0).unwrap();
    let node = fs.select(b"/tailfile").expect("tailfile should resolve");
    let inode = match node {
        Node::Leaf { inode, .. } => inode,
        Node::Directory(_) => panic!("tailfile should be a regular file"),
    };
    let content = fs.read_file(&inode).unwrap();
    assert_eq!(content, expected_content);
}
