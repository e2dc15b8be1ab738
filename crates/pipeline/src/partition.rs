//! Recursive binary partitioning of a key list into a task tree.

use downscale_storage::ObjectKey;
use std::sync::Arc;

/// Maximum number of keys a leaf may hold.
pub const LEAF_SIZE: usize = 2;

/// A contiguous run of keys to move from one bucket to another.
///
/// Bucket names are reference counted so that splitting never copies them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    source: Arc<str>,
    destination: Arc<str>,
    keys: Vec<ObjectKey>,
}

impl WorkItem {
    pub fn new(source: impl Into<Arc<str>>, destination: impl Into<Arc<str>>, keys: Vec<ObjectKey>) -> Self {
        Self { source: source.into(), destination: destination.into(), keys }
    }

    pub fn source_bucket(&self) -> &str {
        &self.source
    }

    pub fn destination_bucket(&self) -> &str {
        &self.destination
    }

    pub fn keys(&self) -> &[ObjectKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Split into two contiguous halves; the left one takes the extra key
    /// when the count is odd.
    fn split(self) -> (Self, Self) {
        let Self { source, destination, mut keys } = self;
        let right_keys = keys.split_off(keys.len().div_ceil(2));
        let left = Self { source: Arc::clone(&source), destination: Arc::clone(&destination), keys };
        let right = Self { source, destination, keys: right_keys };
        (left, right)
    }
}

/// A node of the task tree.
///
/// Only leaves carry work, and no leaf ever holds more than [`LEAF_SIZE`]
/// keys. Reading the leaves left to right gives back the original key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskNode {
    Leaf(WorkItem),
    Split { left: Box<TaskNode>, right: Box<TaskNode> },
}

impl TaskNode {
    /// Build the task tree for `item`.
    ///
    /// Items of at most [`LEAF_SIZE`] keys (including empty ones) become a
    /// single leaf; anything larger is halved recursively, giving a tree of
    /// depth `⌈log2(n / 2)⌉`.
    ///
    /// ```
    /// use downscale_pipeline::{TaskNode, WorkItem};
    ///
    /// let keys = ["a.png", "b.png", "c.png", "d.png", "e.png"].map(Into::into).to_vec();
    /// let tree = TaskNode::partition(WorkItem::new("src", "dst", keys));
    /// let leaves: Vec<Vec<&str>> =
    ///     tree.leaves().iter().map(|leaf| leaf.keys().iter().map(|k| k.as_str()).collect()).collect();
    /// assert_eq!(leaves, vec![vec!["a.png", "b.png"], vec!["c.png"], vec!["d.png", "e.png"]]);
    /// assert_eq!(tree.depth(), 2);
    /// ```
    pub fn partition(item: WorkItem) -> Self {
        if item.len() <= LEAF_SIZE {
            return Self::Leaf(item);
        }
        let (left, right) = item.split();
        Self::Split { left: Box::new(Self::partition(left)), right: Box::new(Self::partition(right)) }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<&WorkItem> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf(item) => leaves.push(item),
                Self::Split { left, right } => {
                    // Right first, so the left subtree is popped first.
                    stack.push(right);
                    stack.push(left);
                },
            }
        }
        leaves
    }

    /// Total number of keys across every leaf.
    pub fn key_count(&self) -> usize {
        match self {
            Self::Leaf(item) => item.len(),
            Self::Split { left, right } => left.key_count() + right.key_count(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Split { left, right } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Number of edges on the longest root-to-leaf path; a lone leaf has
    /// depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Split { left, right } => 1 + left.depth().max(right.depth()),
        }
    }
}
