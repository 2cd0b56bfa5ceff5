//! The top-level reader tying every component together.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::rc::{Rc, Weak};

use tracing::info;

use crate::compressor::Compressor;
use crate::data::DataBlockReader;
use crate::dir::{self, EntryType};
use crate::error::{Result, SquashfsError};
use crate::file;
use crate::fragment::FragmentTable;
use crate::id::IdTable;
use crate::inode::{self, Inode};
use crate::metadata::MetadataStream;
use crate::superblock::{Flags, Superblock};
use crate::tree::{Directory, Node};
use crate::xattr::{XattrKey, XattrTables};
use crate::ReadSeek;

/// A read-only, single-threaded handle onto a SquashFS 4.0 image. `open` eagerly walks the whole
/// directory tree; everything else (file content, fragment tails, xattr values) is fetched lazily
/// and cached internally.
pub struct Squashfs<R: ReadSeek> {
    source: RefCell<R>,
    offset: u64,
    superblock: Superblock,
    compressor: Compressor,
    flags: Flags,
    id_table: IdTable,
    fragment_table: FragmentTable,
    xattr_tables: XattrTables,
    inode_stream: RefCell<MetadataStream>,
    dir_stream: RefCell<MetadataStream>,
    data: RefCell<DataBlockReader>,
    root: Rc<RefCell<Directory>>,
}

impl<R: ReadSeek> Squashfs<R> {
    /// Opens an image starting at `offset` within `source` (0 for a bare image file). Validates
    /// the superblock, loads the id/fragment/xattr tables, and builds the full directory tree.
    pub fn open(mut source: R, offset: u64) -> Result<Self> {
        use std::io::Seek;

        source.seek(SeekFrom::Start(offset))?;
        let superblock = Superblock::read(&mut source)?;
        let flags = superblock.flags();
        let compressor = Compressor::new(superblock.compressor(), flags, &mut source)?;

        info!(
            compressor = compressor.name(),
            block_size = superblock.block_size(),
            "opened squashfs image"
        );

        let id_table = IdTable::read(&mut source, &compressor, flags, &superblock, offset)?;
        let fragment_table = FragmentTable::read(&mut source, &compressor, flags, &superblock, offset)?;
        let xattr_tables = XattrTables::read(&mut source, &compressor, flags, &superblock, offset)?;

        let inode_table_start = to_absolute(offset, superblock.inode_table_start())?;
        let directory_table_start = to_absolute(offset, superblock.directory_table_start())?;

        let mut inode_stream = MetadataStream::new();
        let mut dir_stream = MetadataStream::new();

        let root_ref = superblock.root_inode();
        if root_ref < 0 {
            return Err(SquashfsError::format("root inode reference is invalid"));
        }
        let root_ref = root_ref as u64;
        let root_block = inode_table_start + (root_ref >> 16);
        let root_offset = (root_ref & 0xffff) as usize;

        let root_inode = inode::read_inode(
            &mut source,
            &compressor,
            flags,
            &superblock,
            &id_table,
            &mut inode_stream,
            root_block,
            root_offset,
        )?;

        let root = build_directory(
            &mut source,
            &compressor,
            flags,
            &superblock,
            &id_table,
            &mut inode_stream,
            &mut dir_stream,
            inode_table_start,
            directory_table_start,
            root_inode,
            None,
            Vec::new(),
        )?;

        Ok(Self {
            source: RefCell::new(source),
            offset,
            superblock,
            compressor,
            flags,
            id_table,
            fragment_table,
            xattr_tables,
            inode_stream: RefCell::new(inode_stream),
            dir_stream: RefCell::new(dir_stream),
            data: RefCell::new(DataBlockReader::new()),
            root,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// The byte offset within the source at which this image starts.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn root(&self) -> Rc<RefCell<Directory>> {
        Rc::clone(&self.root)
    }

    /// Resolves a `/`-separated absolute path against the tree. `/` itself selects the root.
    pub fn select(&self, path: &[u8]) -> Option<Node> {
        let path = path.strip_prefix(b"/").unwrap_or(path);
        if path.is_empty() {
            return Some(Node::Directory(Rc::clone(&self.root)));
        }

        let mut current = Node::Directory(Rc::clone(&self.root));
        for component in path.split(|&b| b == b'/') {
            if component.is_empty() {
                continue;
            }
            let next = match &current {
                Node::Directory(dir) => dir.borrow().get(component).cloned(),
                Node::Leaf { .. } => None,
            };
            match next {
                Some(node) => current = node,
                None => {
                    tracing::debug!(path = %String::from_utf8_lossy(path), "select miss");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Reads a regular file's complete content.
    pub fn read_file(&self, inode: &Inode) -> Result<Vec<u8>> {
        let mut source = self.source.borrow_mut();
        let mut inode_stream = self.inode_stream.borrow_mut();
        let mut data = self.data.borrow_mut();
        file::read_file(
            &mut *source,
            &self.compressor,
            self.flags,
            self.superblock.block_size(),
            &mut inode_stream,
            &mut data,
            &self.fragment_table,
            inode,
            self.offset,
        )
    }

    /// Streams a regular file's content one block (or fragment tail) at a time. The block list
    /// is decoded up front — the `RefCell`-guarded source and caches can't be held open across
    /// separate `Iterator::next` calls without the iterator owning its own borrow guards — but
    /// each block is still only decompressed once, via `DataBlockReader`'s cache.
    pub fn iter_file(&self, inode: &Inode) -> std::vec::IntoIter<Result<Vec<u8>>> {
        let mut source = self.source.borrow_mut();
        let mut inode_stream = self.inode_stream.borrow_mut();
        let mut data = self.data.borrow_mut();
        let blocks: Vec<Result<Vec<u8>>> = file::iter_file(
            &mut *source,
            &self.compressor,
            self.flags,
            self.superblock.block_size(),
            &mut inode_stream,
            &mut data,
            &self.fragment_table,
            inode,
            self.offset,
        )
        .collect();
        blocks.into_iter()
    }

    /// Resolves an inode's extended attributes, if any.
    pub fn xattrs(&self, xattr_index: u32) -> Result<Vec<(XattrKey, Vec<u8>)>> {
        self.xattr_tables.resolve(xattr_index)
    }

    /// Depth-first iteration over a directory's descendants.
    pub fn riter(&self, dir: &Rc<RefCell<Directory>>) -> crate::tree::RIter {
        crate::tree::RIter::new(dir)
    }

    /// Releases the byte source, consuming the reader.
    pub fn close(self) -> R {
        self.source.into_inner()
    }
}

fn to_absolute(offset: u64, table_start: i64) -> Result<u64> {
    if table_start < 0 {
        return Err(SquashfsError::format("required table is marked absent"));
    }
    Ok(offset + table_start as u64)
}

#[allow(clippy::too_many_arguments)]
fn build_directory(
    source: &mut dyn ReadSeek,
    compressor: &Compressor,
    flags: Flags,
    superblock: &Superblock,
    id_table: &IdTable,
    inode_stream: &mut MetadataStream,
    dir_stream: &mut MetadataStream,
    inode_table_start: u64,
    directory_table_start: u64,
    inode: Inode,
    parent: Option<Weak<RefCell<Directory>>>,
    name: Vec<u8>,
) -> Result<Rc<RefCell<Directory>>> {
    let (raw_start, offset, size) = inode
        .directory_region()
        .ok_or_else(|| SquashfsError::format("expected a directory inode"))?;

    let dir_rc = Rc::new(RefCell::new(Directory {
        name,
        inode,
        parent,
        children: Vec::new(),
    }));

    let entries = dir::read_directory(
        source,
        compressor,
        flags,
        dir_stream,
        inode_table_start,
        directory_table_start + raw_start as u64,
        offset,
        size,
    )?;

    for entry in entries {
        let child_inode = inode::read_inode(
            source,
            compressor,
            flags,
            superblock,
            id_table,
            inode_stream,
            entry.inode_block,
            entry.inode_offset,
        )?;

        if child_inode.kind.is_directory() != matches!(entry.kind, EntryType::Directory) {
            return Err(SquashfsError::format(
                "directory entry type disagrees with its inode",
            ));
        }

        let node = if child_inode.kind.is_directory() {
            let child_dir = build_directory(
                source,
                compressor,
                flags,
                superblock,
                id_table,
                inode_stream,
                dir_stream,
                inode_table_start,
                directory_table_start,
                child_inode,
                Some(Rc::downgrade(&dir_rc)),
                entry.name.clone(),
            )?;
            Node::Directory(child_dir)
        } else {
            Node::Leaf {
                name: entry.name.clone(),
                inode: Rc::new(child_inode),
                parent: Rc::downgrade(&dir_rc),
            }
        };

        dir_rc.borrow_mut().children.push((entry.name, node));
    }

    Ok(dir_rc)
}
