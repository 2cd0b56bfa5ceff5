//! Component L: the in-memory tree built by walking directory regions.
//!
//! Built eagerly and held by `Squashfs` so that `select`/`riter`/listing never need to re-walk
//! the image. Directories own their children; each directory also keeps a weak link back to its
//! parent so callers can walk upward (e.g. to reconstruct a path) without creating a reference
//! cycle.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::inode::{Inode, InodeType};

/// A directory node. Children are kept in on-disk order, matching the order entries were
/// produced by the directory walker (component K).
pub struct Directory {
    pub name: Vec<u8>,
    pub inode: Inode,
    pub parent: Option<Weak<RefCell<Directory>>>,
    pub children: Vec<(Vec<u8>, Node)>,
}

/// A tree node: either a subdirectory or a non-directory leaf carrying its own inode.
#[derive(Clone)]
pub enum Node {
    Directory(Rc<RefCell<Directory>>),
    Leaf {
        name: Vec<u8>,
        inode: Rc<Inode>,
        parent: Weak<RefCell<Directory>>,
    },
}

impl Node {
    pub fn name(&self) -> Vec<u8> {
        match self {
            Self::Directory(dir) => dir.borrow().name.clone(),
            Self::Leaf { name, .. } => name.clone(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl Directory {
    pub fn new_root(inode: Inode) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            name: Vec::new(),
            inode,
            parent: None,
            children: Vec::new(),
        }))
    }

    pub fn get(&self, name: &[u8]) -> Option<&Node> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }
}

/// Depth-first iterator over a directory's descendants, yielding `(path, node)` pairs with
/// slash-joined byte-string paths relative to the directory `riter` was called on.
pub struct RIter {
    stack: Vec<(Vec<u8>, Node)>,
}

impl RIter {
    pub fn new(dir: &Rc<RefCell<Directory>>) -> Self {
        let mut stack: Vec<(Vec<u8>, Node)> = dir
            .borrow()
            .children
            .iter()
            .map(|(name, node)| (name.clone(), node.clone()))
            .collect();
        stack.reverse();
        Self { stack }
    }
}

impl Iterator for RIter {
    type Item = (Vec<u8>, Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        if let Node::Directory(dir) = &node {
            let mut children: Vec<(Vec<u8>, Node)> = dir
                .borrow()
                .children
                .iter()
                .map(|(name, child)| {
                    let mut child_path = path.clone();
                    child_path.push(b'/');
                    child_path.extend_from_slice(name);
                    (child_path, child.clone())
                })
                .collect();
            children.reverse();
            self.stack.extend(children);
        }
        Some((path, node))
    }
}
