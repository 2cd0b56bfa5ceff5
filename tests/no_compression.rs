//! A minimal, uncompressed image: `/foo` containing "bar". Exercises the full
//! open -> tree-build -> read_file pipeline without any decompressor involved.

mod common;

use std::io::Cursor;

use squashfs::{Node, Squashfs};

#[test]
fn lists_and_reads_single_file() {
    let image = common::minimal_single_file_image(b"foo", b"bar");
    let fs = Squashfs::open(Cursor::new(image), 0).unwrap();

    let names: Vec<Vec<u8>> = fs.riter(&fs.root()).map(|(path, _)| path).collect();
    assert_eq!(names, vec![b"foo".to_vec()]);

    let node = fs.select(b"/foo").expect("foo should resolve");
    let inode = match node {
        Node::Leaf { inode, .. } => inode,
        Node::Directory(_) => panic!("foo should be a regular file"),
    };
    let content = fs.read_file(&inode).unwrap();
    assert_eq!(content, b"bar");
}

#[test]
fn missing_path_resolves_to_none() {
    let image = common::minimal_single_file_image(b"foo", b"bar");
    let fs = Squashfs::open(Cursor::new(image), 0).unwrap();
    assert!(fs.select(b"/nope").is_none());
}
