//! Value types shared by the store, the algorithms and the public API.

use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

/// Identifier of a row participating in a nested-set tree.
pub type NodeId = uuid::Uuid;

/// The four tree coordinates stored alongside every node.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub left: i64,
    pub right: i64,
    pub depth: i64,
    pub ordering: i64,
}

impl Coordinates {
    pub fn new(left: i64, right: i64, depth: i64, ordering: i64) -> Self {
        Self {
            left,
            right,
            depth,
            ordering,
        }
    }

    /// `right - left + 1`.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Number of descendants the range has room for, `(right - left - 1) / 2`.
    ///
    /// Equals the live descendant count only while the subtree has no gaps.
    pub fn descendant_capacity(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Whether `other` lies strictly inside this range.
    pub fn strictly_contains(&self, other: &Coordinates) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Whether `position` lies within `[left, right]`.
    pub fn covers(&self, position: i64) -> bool {
        self.left <= position && position <= self.right
    }
}

/// A live row: its identity, its parent edge and its coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub coordinates: Coordinates,
}

impl TreeNode {
    pub fn new(id: NodeId, parent_id: Option<NodeId>, coordinates: Coordinates) -> Self {
        Self {
            id,
            parent_id,
            coordinates,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Pagination applied to id listings. Results are always ordered by `left`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// No limit, no offset.
    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let skipped = items.skip(usize::try_from(self.offset).unwrap_or(usize::MAX));
        match self.limit {
            Some(limit) => skipped
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => skipped.collect(),
        }
    }
}

/// Number of live nodes found at one depth.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct LevelWidth {
    pub depth: i64,
    pub width: i64,
}

/// Aggregate figures describing one table's tree.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TreeStatistics {
    pub total_nodes: i64,
    pub root_count: i64,
    pub leaf_count: i64,
    pub height: i64,
    pub max_right: i64,
    pub levels: Vec<LevelWidth>,
}
