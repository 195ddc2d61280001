//! Mutating tree operations, written against [`CoordinateStore`].
//!
//! None of these functions open a transaction. Callers that need the
//! all-or-nothing behaviour run them inside one; `NestedSetManager` does.

use tracing::debug;

use crate::error::{NestedSetError, Result};
use crate::node::{Coordinates, NodeId, TreeNode};
use crate::store::CoordinateStore;

/// Compute coordinates for a new right-most node under `parent` and open the
/// gap it will occupy. The row itself is not written.
pub async fn create_node<S>(store: &S, parent: Option<NodeId>, base_ordering: i64) -> Result<Coordinates>
where
    S: CoordinateStore + ?Sized,
{
    let ordering = match store.max_child_ordering(parent).await? {
        Some(max) => base_ordering.max(max + 1),
        None => base_ordering,
    };

    let coordinates = match parent {
        None => {
            let left = store.max_right().await? + 1;
            Coordinates::new(left, left + 1, 0, ordering)
        }
        Some(parent_id) => {
            let parent = store.get_coordinates(parent_id).await?;
            store.shift_ranges(parent.right, 2).await?;
            Coordinates::new(parent.right, parent.right + 1, parent.depth + 1, ordering)
        }
    };

    Ok(coordinates)
}

/// [`create_node`] followed by inserting a bare row for `id`.
pub async fn insert_node<S>(
    store: &S,
    id: NodeId,
    parent: Option<NodeId>,
    base_ordering: i64,
) -> Result<TreeNode>
where
    S: CoordinateStore + ?Sized,
{
    let coordinates = create_node(store, parent, base_ordering).await?;
    let node = TreeNode::new(id, parent, coordinates);
    store.insert_node(&node).await?;
    Ok(node)
}

/// Re-attach the subtree rooted at `id` as the right-most child of
/// `new_parent`, or as the right-most root when `new_parent` is `None`.
pub async fn move_subtree<S>(store: &S, id: NodeId, new_parent: Option<NodeId>) -> Result<()>
where
    S: CoordinateStore + ?Sized,
{
    let source = store.get_coordinates(id).await?;

    if let Some(parent_id) = new_parent {
        let target = store.get_coordinates(parent_id).await?;
        if source.covers(target.left) {
            return Err(NestedSetError::invalid_move(format!(
                "cannot move node {id} under {parent_id}, which is inside its own subtree"
            )));
        }
    }

    let ordering = store
        .max_child_ordering(new_parent)
        .await?
        .map_or(1, |max| max + 1);
    let width = source.width();

    store.stage_subtree(source.left, source.right).await?;
    store.shift_ranges(source.right, -width).await?;

    // The target's coordinates moved during compaction, so read them again.
    let (target_left, target_depth) = match new_parent {
        Some(parent_id) => {
            let parent = store.get_coordinates(parent_id).await?;
            store.shift_ranges(parent.right, width).await?;
            (parent.right, parent.depth + 1)
        }
        None => (store.max_right().await? + 1, 0),
    };

    let offset = target_left - source.left;
    let depth_delta = target_depth - source.depth;
    let moved = store.restore_staged(offset, depth_delta).await?;

    let mut root = store.get_coordinates(id).await?;
    root.ordering = ordering;
    store.write_coordinates(id, &root).await?;
    store.set_parent(id, new_parent).await?;

    debug!(%id, ?new_parent, moved, offset, depth_delta, "moved subtree");
    Ok(())
}

/// Soft-delete the node and all of its descendants. Coordinates are left as
/// they are; a rebuild closes the gap.
pub async fn delete_subtree<S>(store: &S, id: NodeId) -> Result<u64>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    let deleted = store.soft_delete_range(range.left, range.right).await?;
    debug!(%id, deleted, "soft-deleted subtree");
    Ok(deleted)
}
