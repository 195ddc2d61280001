use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{NestedSetError, Result};
use crate::node::{Coordinates, LevelWidth, NodeId, Page, TreeNode};
use crate::query::TreeQuery;
use crate::store::CoordinateStore;

#[derive(Copy, Clone, Debug)]
struct Row {
    node: TreeNode,
    deleted: bool,
}

/// In-process [`CoordinateStore`], used to exercise the tree algorithms
/// without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<NodeId, Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<NodeId, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live rows ordered by `left`.
    pub fn snapshot(&self) -> Vec<TreeNode> {
        let mut nodes: Vec<TreeNode> = self
            .rows()
            .values()
            .filter(|row| !row.deleted)
            .map(|row| row.node)
            .collect();
        nodes.sort_by_key(|node| (node.coordinates.left, node.id));
        nodes
    }

    /// Whether `id` exists and has been soft-deleted.
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.rows().get(&id).is_some_and(|row| row.deleted)
    }

    fn live_mut<'r>(rows: &'r mut BTreeMap<NodeId, Row>, id: NodeId) -> Result<&'r mut Row> {
        rows.get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or(NestedSetError::NotFound(id))
    }

    fn update_live(&self, mut update: impl FnMut(&mut Coordinates) -> bool) -> u64 {
        let mut rows = self.rows();
        let mut touched = 0;
        for row in rows.values_mut().filter(|row| !row.deleted) {
            if update(&mut row.node.coordinates) {
                touched += 1;
            }
        }
        touched
    }

    fn matching(&self, query: &TreeQuery) -> Vec<TreeNode> {
        let live = self.snapshot();
        let parents: HashSet<NodeId> = live.iter().filter_map(|node| node.parent_id).collect();
        live.into_iter()
            .filter(|node| query.matches(node, |id| parents.contains(&id)))
            .collect()
    }
}

#[async_trait]
impl CoordinateStore for MemoryStore {
    async fn get_node(&self, id: NodeId) -> Result<TreeNode> {
        let mut rows = self.rows();
        Ok(Self::live_mut(&mut rows, id)?.node)
    }

    async fn max_right(&self) -> Result<i64> {
        Ok(self
            .rows()
            .values()
            .filter(|row| !row.deleted && row.node.coordinates.left > 0)
            .map(|row| row.node.coordinates.right)
            .max()
            .unwrap_or(0))
    }

    async fn max_child_ordering(&self, parent: Option<NodeId>) -> Result<Option<i64>> {
        Ok(self
            .rows()
            .values()
            .filter(|row| !row.deleted && row.node.parent_id == parent)
            .map(|row| row.node.coordinates.ordering)
            .max())
    }

    async fn shift_ranges(&self, pivot: i64, delta: i64) -> Result<u64> {
        Ok(self.update_live(|c| {
            if c.right < pivot {
                return false;
            }
            c.right += delta;
            if c.left > pivot {
                c.left += delta;
            }
            true
        }))
    }

    async fn write_coordinates(&self, id: NodeId, coordinates: &Coordinates) -> Result<()> {
        let mut rows = self.rows();
        Self::live_mut(&mut rows, id)?.node.coordinates = *coordinates;
        Ok(())
    }

    async fn write_many(&self, updates: &[(NodeId, Coordinates)]) -> Result<()> {
        let mut rows = self.rows();
        for (id, coordinates) in updates {
            if let Some(row) = rows.get_mut(id) {
                row.node.coordinates = *coordinates;
            }
        }
        Ok(())
    }

    async fn insert_node(&self, node: &TreeNode) -> Result<()> {
        let mut rows = self.rows();
        if rows.contains_key(&node.id) {
            return Err(NestedSetError::invalid_operation(format!(
                "node {} already exists",
                node.id
            )));
        }
        rows.insert(
            node.id,
            Row {
                node: *node,
                deleted: false,
            },
        );
        Ok(())
    }

    async fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        let mut rows = self.rows();
        Self::live_mut(&mut rows, id)?.node.parent_id = parent;
        Ok(())
    }

    async fn stage_subtree(&self, left: i64, right: i64) -> Result<u64> {
        Ok(self.update_live(|c| {
            if c.left >= left && c.right <= right {
                c.left = -c.left;
                c.right = -c.right;
                true
            } else {
                false
            }
        }))
    }

    async fn restore_staged(&self, offset: i64, depth_delta: i64) -> Result<u64> {
        Ok(self.update_live(|c| {
            if c.left < 0 {
                c.left = -c.left + offset;
                c.right = -c.right + offset;
                c.depth += depth_delta;
                true
            } else {
                false
            }
        }))
    }

    async fn soft_delete_range(&self, left: i64, right: i64) -> Result<u64> {
        let mut rows = self.rows();
        let mut deleted = 0;
        for row in rows.values_mut().filter(|row| !row.deleted) {
            let c = row.node.coordinates;
            if c.left >= left && c.right <= right {
                row.deleted = true;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn live_nodes(&self) -> Result<Vec<TreeNode>> {
        Ok(self.snapshot())
    }

    async fn select_ids(&self, query: &TreeQuery, page: Page) -> Result<Vec<NodeId>> {
        let matching = self.matching(query);
        Ok(page.apply(matching.into_iter().map(|node| node.id)))
    }

    async fn count(&self, query: &TreeQuery) -> Result<i64> {
        i64::try_from(self.matching(query).len())
            .map_err(|_| NestedSetError::invariant("row count exceeds i64"))
    }

    async fn max_depth(&self) -> Result<i64> {
        Ok(self
            .snapshot()
            .iter()
            .map(|node| node.coordinates.depth)
            .max()
            .unwrap_or(0))
    }

    async fn level_widths(&self) -> Result<Vec<LevelWidth>> {
        let mut widths: BTreeMap<i64, i64> = BTreeMap::new();
        for node in self.snapshot() {
            *widths.entry(node.coordinates.depth).or_default() += 1;
        }
        Ok(widths
            .into_iter()
            .map(|(depth, width)| LevelWidth { depth, width })
            .collect())
    }
}
