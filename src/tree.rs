//! Nested file trees built from flat relative paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, StoreError};

/// Content of a single uploaded file, stored as
/// `{"type": "json"|"text", "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum FileEntry {
    Json(Value),
    Text(String),
}

impl FileEntry {
    /// Bytes written back into an archive. JSON is pretty-printed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            FileEntry::Json(value) => {
                serde_json::to_vec_pretty(value).map_err(|e| StoreError::Encode(e.to_string()))
            }
            FileEntry::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    File(FileEntry),
    Dir(Tree),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree(BTreeMap<String, TreeNode>);

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, P>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, FileEntry)>,
        P: AsRef<str>,
    {
        let mut tree = Tree::new();
        for (path, entry) in entries {
            tree.insert(path.as_ref(), entry)?;
        }
        Ok(tree)
    }

    /// Inserts `entry` at `path`, creating intermediate directories.
    ///
    /// Empty segments are ignored (`/a//b` is `a/b`). Writing a file over an
    /// existing file replaces it.
    pub fn insert(&mut self, path: &str, entry: FileEntry) -> Result<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let Some((leaf, dirs)) = segments.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };

        let mut node = &mut self.0;
        let mut walked = String::new();
        for segment in dirs {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(segment);
            let child = node
                .entry((*segment).to_string())
                .or_insert_with(|| TreeNode::Dir(Tree::new()));
            node = match child {
                TreeNode::Dir(tree) => &mut tree.0,
                TreeNode::File(_) => return Err(StoreError::PathConflict(walked)),
            };
        }

        if let Some(TreeNode::Dir(_)) = node.get(*leaf) {
            return Err(StoreError::PathConflict(segments.join("/")));
        }
        node.insert((*leaf).to_string(), TreeNode::File(entry));
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut node = self.0.get(segments.next()?)?;
        for segment in segments {
            node = match node {
                TreeNode::Dir(tree) => tree.0.get(segment)?,
                TreeNode::File(_) => return None,
            };
        }
        Some(node)
    }

    /// Every file in the tree with its full `/`-joined path, depth first.
    pub fn files(&self) -> Vec<(String, &FileEntry)> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    fn collect_files<'a>(&'a self, base: &str, out: &mut Vec<(String, &'a FileEntry)>) {
        for (name, node) in &self.0 {
            let path = format!("{}{}", base, name);
            match node {
                TreeNode::File(entry) => out.push((path, entry)),
                TreeNode::Dir(tree) => tree.collect_files(&format!("{}/", path), out),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
