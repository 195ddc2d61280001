//! Storage boundary for tree coordinates.
//!
//! Nothing outside this module reads or writes coordinate columns.

mod memory;
mod sql;

use async_trait::async_trait;

use crate::error::Result;
use crate::node::{Coordinates, LevelWidth, NodeId, Page, TreeNode};
use crate::query::TreeQuery;

pub use memory::MemoryStore;
pub use sql::SqlStore;

/// Reads and writes the tree columns of a single table.
///
/// Every method only considers live (not soft-deleted) rows. Implementations
/// do not open transactions; atomicity across calls is the caller's business.
#[async_trait]
pub trait CoordinateStore: Send + Sync {
    /// Fails with `NotFound` for missing or soft-deleted rows.
    async fn get_node(&self, id: NodeId) -> Result<TreeNode>;

    async fn get_coordinates(&self, id: NodeId) -> Result<Coordinates> {
        Ok(self.get_node(id).await?.coordinates)
    }

    /// Largest `right` in the table, 0 when empty. Rows staged by a move
    /// (negative `left`) are not counted.
    async fn max_right(&self) -> Result<i64>;

    /// Largest ordering among the children of `parent` (roots for `None`).
    async fn max_child_ordering(&self, parent: Option<NodeId>) -> Result<Option<i64>>;

    /// `right += delta` where `right >= pivot`; `left += delta` where `left > pivot`.
    async fn shift_ranges(&self, pivot: i64, delta: i64) -> Result<u64>;

    async fn write_coordinates(&self, id: NodeId, coordinates: &Coordinates) -> Result<()>;

    async fn write_many(&self, updates: &[(NodeId, Coordinates)]) -> Result<()>;

    async fn insert_node(&self, node: &TreeNode) -> Result<()>;

    async fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> Result<()>;

    /// Negate the coordinates of every row inside `[left, right]`.
    ///
    /// Staged rows sit below zero, out of reach of any shift.
    async fn stage_subtree(&self, left: i64, right: i64) -> Result<u64>;

    /// Bring staged rows back: `left = -left + offset`, same for `right`,
    /// and `depth += depth_delta`.
    async fn restore_staged(&self, offset: i64, depth_delta: i64) -> Result<u64>;

    /// Mark every row inside `[left, right]` as deleted.
    async fn soft_delete_range(&self, left: i64, right: i64) -> Result<u64>;

    /// All live rows ordered by `left`.
    async fn live_nodes(&self) -> Result<Vec<TreeNode>>;

    /// Ids matching `query`, ordered by `left`.
    async fn select_ids(&self, query: &TreeQuery, page: Page) -> Result<Vec<NodeId>>;

    async fn count(&self, query: &TreeQuery) -> Result<i64>;

    /// Largest depth, 0 when empty.
    async fn max_depth(&self) -> Result<i64>;

    async fn level_widths(&self) -> Result<Vec<LevelWidth>>;
}
