//! Materialized paths.
//!
//! A path is a concatenation of fixed-width base-36 segments, one per tree
//! level. Because every segment has the same width and the alphabet sorts in
//! ASCII order, plain string ordering of paths is a pre-order walk of the tree
//! and the descendants of a node occupy the contiguous key range that starts
//! with its path.

use serde::{Deserialize, Serialize};
use std::fmt;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const SEGMENT_WIDTH: usize = 4;
/// Number of distinct segments per level (36^4).
pub const MAX_SEGMENT: u32 = 36 * 36 * 36 * 36;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path length {0} is not a multiple of the segment width")]
    Misaligned(usize),
    #[error("invalid path character {0:?}")]
    InvalidChar(char),
    #[error("no free segment left under this parent")]
    Exhausted,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath(String);

impl TreePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() || raw.len() % SEGMENT_WIDTH != 0 {
            return Err(PathError::Misaligned(raw.len()));
        }
        if let Some(c) = raw.chars().find(|c| !c.is_ascii() || !ALPHABET.contains(&(*c as u8))) {
            return Err(PathError::InvalidChar(c));
        }
        Ok(Self(raw.to_string()))
    }

    /// Path of the root with the given sequence number.
    pub fn root(seq: u32) -> Result<Self, PathError> {
        Ok(Self(encode_segment(seq)?))
    }

    pub fn child(&self, seq: u32) -> Result<Self, PathError> {
        let mut raw = self.0.clone();
        raw.push_str(&encode_segment(seq)?);
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len() / SEGMENT_WIDTH
    }

    pub fn is_root(&self) -> bool {
        self.depth() == 1
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - SEGMENT_WIDTH].to_string()))
        }
    }

    /// Strict ancestors, root first.
    pub fn ancestors(&self) -> Vec<TreePath> {
        (1..self.depth())
            .map(|level| Self(self.0[..level * SEGMENT_WIDTH].to_string()))
            .collect()
    }

    /// Ancestors plus this path, root first.
    pub fn chain(&self) -> Vec<TreePath> {
        let mut chain = self.ancestors();
        chain.push(self.clone());
        chain
    }

    /// True when `self` lies strictly below `other`.
    pub fn is_descendant_of(&self, other: &TreePath) -> bool {
        self.0.len() > other.0.len() && self.0.starts_with(&other.0)
    }

    /// True when `self` is `other` or lies below it.
    pub fn is_within(&self, other: &TreePath) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Decoded value of the segment at `level` (1-based).
    pub fn segment(&self, level: usize) -> Option<u32> {
        if level == 0 || level > self.depth() {
            return None;
        }
        let start = (level - 1) * SEGMENT_WIDTH;
        decode_segment(&self.0[start..start + SEGMENT_WIDTH])
    }

    /// Replace the `old` prefix by `new`. The caller guarantees `self` is within `old`.
    pub fn rebase(&self, old: &TreePath, new: &TreePath) -> TreePath {
        debug_assert!(self.is_within(old));
        let mut raw = new.0.clone();
        raw.push_str(&self.0[old.0.len()..]);
        Self(raw)
    }

    /// Exclusive upper bound of the key range holding this path and its subtree.
    pub fn subtree_end(&self) -> String {
        // '~' sorts after every alphabet character
        format!("{}~", self.0)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for TreePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TreePath {
    type Error = PathError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.0
    }
}

fn encode_segment(mut value: u32) -> Result<String, PathError> {
    if value >= MAX_SEGMENT {
        return Err(PathError::Exhausted);
    }
    let mut out = [b'0'; SEGMENT_WIDTH];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    Ok(out.iter().map(|b| *b as char).collect())
}

fn decode_segment(raw: &str) -> Option<u32> {
    raw.bytes().try_fold(0u32, |acc, b| {
        let digit = ALPHABET.iter().position(|a| *a == b)? as u32;
        Some(acc * 36 + digit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_encode_fixed_width() {
        assert_eq!(TreePath::root(0).unwrap().as_str(), "0000");
        assert_eq!(TreePath::root(1).unwrap().as_str(), "0001");
        assert_eq!(TreePath::root(36).unwrap().as_str(), "0010");
        assert_eq!(TreePath::root(MAX_SEGMENT - 1).unwrap().as_str(), "ZZZZ");
        assert_eq!(TreePath::root(MAX_SEGMENT), Err(PathError::Exhausted));
    }

    #[test]
    fn ordering_is_preorder() {
        let root = TreePath::root(1).unwrap();
        let a = root.child(1).unwrap();
        let a1 = a.child(1).unwrap();
        let b = root.child(2).unwrap();
        let mut paths = vec![b.clone(), a1.clone(), root.clone(), a.clone()];
        paths.sort();
        assert_eq!(paths, vec![root, a, a1, b]);
    }

    #[test]
    fn ancestors_and_parent() {
        let path = TreePath::parse("000100020003").unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.parent().unwrap().as_str(), "00010002");
        let ancestors: Vec<_> = path.ancestors().into_iter().map(String::from).collect();
        assert_eq!(ancestors, vec!["0001", "00010002"]);
        assert_eq!(path.chain().len(), 3);
        assert!(TreePath::root(5).unwrap().parent().is_none());
    }

    #[test]
    fn descendant_checks() {
        let root = TreePath::parse("0001").unwrap();
        let child = TreePath::parse("00010001").unwrap();
        let other = TreePath::parse("0002").unwrap();
        assert!(child.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&root));
        assert!(root.is_within(&root));
        assert!(!other.is_within(&root));
        assert!(child.as_str() < root.subtree_end().as_str());
        assert!(other.as_str() > root.subtree_end().as_str());
    }

    #[test]
    fn rebase_swaps_prefix() {
        let old = TreePath::parse("0001").unwrap();
        let new = TreePath::parse("00020005").unwrap();
        let node = TreePath::parse("000100030004").unwrap();
        assert_eq!(node.rebase(&old, &new).as_str(), "0002000500030004");
    }

    #[test]
    fn segment_decoding() {
        let path = TreePath::parse("0001000Z").unwrap();
        assert_eq!(path.segment(1), Some(1));
        assert_eq!(path.segment(2), Some(35));
        assert_eq!(path.segment(3), None);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(TreePath::parse("001"), Err(PathError::Misaligned(3)));
        assert_eq!(TreePath::parse("00a1"), Err(PathError::InvalidChar('a')));
        assert!(serde_json::from_str::<TreePath>("\"0001\"").is_ok());
        assert!(serde_json::from_str::<TreePath>("\"01\"").is_err());
    }
}
