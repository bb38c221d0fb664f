use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fs::SFSError;

/// A directory tree entry. Files hold only the allocation table key of their record, the table
/// stays the single owner of the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Directory(BTreeMap<String, Node>),
    File(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Directory,
    File,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: Kind,
}

/// The hierarchical index over the allocation table. The root is an unnamed directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTree {
    root: BTreeMap<String, Node>,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &BTreeMap<String, Node> {
        &self.root
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Checks that a file could be attached at `segments` without disturbing existing entries.
    /// Nothing is modified.
    pub fn check_insert(&self, segments: &[&str]) -> Result<(), SFSError> {
        let (last, parents) = segments
            .split_last()
            .expect("normalized paths have at least one segment");

        let mut current = &self.root;
        for (depth, part) in parents.iter().enumerate() {
            match current.get(*part) {
                None => return Ok(()),
                Some(Node::Directory(children)) => current = children,
                Some(Node::File(_)) => {
                    return Err(SFSError::NotADirectory(segments[..=depth].join("/")))
                }
            }
        }

        match current.get(*last) {
            None => Ok(()),
            Some(Node::Directory(_)) => Err(SFSError::IsADirectory(segments.join("/"))),
            Some(Node::File(_)) => Err(SFSError::AlreadyExists(segments.join("/"))),
        }
    }

    /// Attaches a file leaf referencing `key`, creating intermediate directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if an intermediate segment is a file. [`DirectoryTree::check_insert`] must have
    /// accepted the path first.
    pub fn insert(&mut self, segments: &[&str], key: String) {
        let (last, parents) = segments
            .split_last()
            .expect("normalized paths have at least one segment");

        let mut current = &mut self.root;
        for part in parents {
            let child = current
                .entry(part.to_string())
                .or_insert_with(|| Node::Directory(BTreeMap::new()));
            current = match child {
                Node::Directory(children) => children,
                Node::File(_) => panic!("path segment {:?} of {:?} is a file", part, key),
            };
        }
        current.insert(last.to_string(), Node::File(key));
    }

    /// Detaches the file leaf at `segments` and returns the key it referenced. Directories left
    /// empty are kept.
    ///
    /// # Panics
    ///
    /// Panics if the walk does not end at a file. Only paths known live in the allocation table
    /// are removed, so a miss means the tree and the table have diverged.
    pub fn remove(&mut self, segments: &[&str]) -> String {
        let (last, parents) = segments
            .split_last()
            .expect("normalized paths have at least one segment");

        let mut current = &mut self.root;
        for part in parents {
            current = match current.get_mut(*part) {
                Some(Node::Directory(children)) => children,
                _ => panic!("directory {:?} missing for {:?}", part, segments.join("/")),
            };
        }
        match current.remove(*last) {
            Some(Node::File(key)) => key,
            other => panic!("expected file at {:?}, found {:?}", segments.join("/"), other),
        }
    }

    pub fn lookup(&self, segments: &[&str]) -> Option<&Node> {
        let (last, parents) = segments.split_last()?;
        let mut current = &self.root;
        for part in parents {
            match current.get(*part)? {
                Node::Directory(children) => current = children,
                Node::File(_) => return None,
            }
        }
        current.get(*last)
    }

    /// Lists the children of the directory at `segments`, an empty slice naming the root.
    pub fn list(&self, segments: &[&str]) -> Result<Vec<DirEntry>, SFSError> {
        let children = if segments.is_empty() {
            &self.root
        } else {
            match self.lookup(segments) {
                Some(Node::Directory(children)) => children,
                Some(Node::File(_)) => return Err(SFSError::NotADirectory(segments.join("/"))),
                None => return Err(SFSError::PathNotFound(segments.join("/"))),
            }
        };

        Ok(children
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    Node::Directory(_) => Kind::Directory,
                    Node::File(_) => Kind::File,
                },
            })
            .collect())
    }

    /// Checks that every entry name could appear as a segment of a normalized path. Returns the
    /// offending path, as far as it resolves, otherwise.
    pub fn check_names(&self) -> Result<(), String> {
        fn walk(prefix: &str, children: &BTreeMap<String, Node>) -> Result<(), String> {
            for (name, node) in children {
                let path = format!("{}{}{}", prefix, if prefix.is_empty() { "" } else { "/" }, name);
                if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                    return Err(path);
                }
                if let Node::Directory(grandchildren) = node {
                    walk(&path, grandchildren)?;
                }
            }
            Ok(())
        }

        walk("", &self.root)
    }

    /// Every file leaf as `(resolved path, referenced key)`, depth first in name order.
    pub fn files(&self) -> Vec<(String, &str)> {
        fn walk<'a>(
            prefix: &str,
            children: &'a BTreeMap<String, Node>,
            out: &mut Vec<(String, &'a str)>,
        ) {
            for (name, node) in children {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", prefix, name)
                };
                match node {
                    Node::Directory(grandchildren) => walk(&path, grandchildren, out),
                    Node::File(key) => out.push((path, key.as_str())),
                }
            }
        }

        let mut out = Vec::new();
        walk("", &self.root, &mut out);
        out
    }
}

/// Renders the tree one entry per line, two spaces of indent per level, directories suffixed
/// with `/`.
impl fmt::Display for DirectoryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(
            f: &mut fmt::Formatter<'_>,
            children: &BTreeMap<String, Node>,
            depth: usize,
        ) -> fmt::Result {
            for (name, node) in children {
                match node {
                    Node::Directory(grandchildren) => {
                        writeln!(f, "{:indent$}{}/", "", name, indent = depth * 2)?;
                        render(f, grandchildren, depth + 1)?;
                    }
                    Node::File(_) => writeln!(f, "{:indent$}{}", "", name, indent = depth * 2)?,
                }
            }
            Ok(())
        }

        render(f, &self.root, 0)
    }
}
