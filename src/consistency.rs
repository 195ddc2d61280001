//! Validation and rebuilding of a whole tree from a snapshot of live nodes.
//!
//! [`validate`] and [`plan_rebuild`] work on rows already loaded; [`renumber`]
//! loads them from a store and writes the planned coordinates back.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::error::{NestedSetError, Result};
use crate::node::{Coordinates, NodeId, TreeNode};
use crate::store::CoordinateStore;

/// Class of structural problem reported by [`validate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ProblemKind {
    /// `parent_id` points at a missing or deleted node.
    Orphan,
    /// The parent chain loops back on itself.
    Cycle,
    /// `left >= right`.
    InvalidRange,
    /// Two ranges partially overlap or share a boundary.
    Overlap,
    /// The parent's range does not strictly contain the child's.
    ParentRange,
    /// Depth disagrees with the parent edge.
    Depth,
}

/// One problem class with the number of nodes it affects.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TreeProblem {
    pub kind: ProblemKind,
    pub count: usize,
}

impl fmt::Display for TreeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count;
        match self.kind {
            ProblemKind::Orphan => write!(f, "{count} orphaned node(s) reference a missing parent"),
            ProblemKind::Cycle => write!(f, "{count} node(s) are part of a parent cycle"),
            ProblemKind::InvalidRange => {
                write!(f, "{count} node(s) have a left boundary not below their right boundary")
            }
            ProblemKind::Overlap => {
                write!(f, "{count} node(s) partially overlap another node's range")
            }
            ProblemKind::ParentRange => {
                write!(f, "{count} node(s) lie outside their parent's range")
            }
            ProblemKind::Depth => write!(f, "{count} node(s) have a depth inconsistent with their parent"),
        }
    }
}

/// Outcome of [`validate`]; empty when the tree is consistent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationReport {
    problems: Vec<TreeProblem>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[TreeProblem] {
        &self.problems
    }

    pub fn count(&self, kind: ProblemKind) -> usize {
        self.problems
            .iter()
            .find(|problem| problem.kind == kind)
            .map_or(0, |problem| problem.count)
    }

    /// One human-readable line per problem class.
    pub fn messages(&self) -> Vec<String> {
        self.problems.iter().map(ToString::to_string).collect()
    }

    fn record(&mut self, kind: ProblemKind, count: usize) {
        if count > 0 {
            self.problems.push(TreeProblem { kind, count });
        }
    }
}

/// Check the live nodes of one table against the nested-set invariants.
pub fn validate(nodes: &[TreeNode]) -> ValidationReport {
    let by_id: HashMap<NodeId, &TreeNode> = nodes.iter().map(|node| (node.id, node)).collect();
    let mut report = ValidationReport::default();

    let orphans = nodes
        .iter()
        .filter(|node| matches!(node.parent_id, Some(parent) if !by_id.contains_key(&parent)))
        .count();
    report.record(ProblemKind::Orphan, orphans);

    report.record(ProblemKind::Cycle, cyclic_nodes(nodes, &by_id).len());

    let invalid = nodes
        .iter()
        .filter(|node| node.coordinates.left >= node.coordinates.right)
        .count();
    report.record(ProblemKind::InvalidRange, invalid);

    report.record(ProblemKind::Overlap, overlapping_nodes(nodes));

    let mut outside = 0;
    let mut depth = 0;
    for node in nodes {
        let c = &node.coordinates;
        match node.parent_id {
            None => {
                if c.depth != 0 {
                    depth += 1;
                }
            }
            Some(parent_id) => {
                let Some(parent) = by_id.get(&parent_id) else {
                    continue;
                };
                if !parent.coordinates.strictly_contains(c) {
                    outside += 1;
                }
                if c.depth != parent.coordinates.depth + 1 {
                    depth += 1;
                }
            }
        }
    }
    report.record(ProblemKind::ParentRange, outside);
    report.record(ProblemKind::Depth, depth);

    report
}

/// Nodes that can reach themselves by following parent edges.
///
/// A node whose chain only runs into a loop is not part of it and is not
/// reported.
fn cyclic_nodes(nodes: &[TreeNode], by_id: &HashMap<NodeId, &TreeNode>) -> HashSet<NodeId> {
    let mut cyclic = HashSet::new();
    let mut visited: HashSet<NodeId> = HashSet::with_capacity(nodes.len());

    for node in nodes {
        let mut path: Vec<NodeId> = Vec::new();
        let mut position: HashMap<NodeId, usize> = HashMap::new();
        let mut current = Some(node.id);

        while let Some(id) = current {
            if visited.contains(&id) {
                break;
            }
            if let Some(&start) = position.get(&id) {
                cyclic.extend(path[start..].iter().copied());
                break;
            }
            position.insert(id, path.len());
            path.push(id);
            current = by_id
                .get(&id)
                .and_then(|node| node.parent_id)
                .filter(|parent| by_id.contains_key(parent));
        }

        visited.extend(path);
    }

    cyclic
}

/// Count nodes whose range conflicts with an enclosing candidate.
///
/// Sorted by `(left asc, right desc)`, every range must either start after the
/// top of the stack ends or sit strictly inside it.
fn overlapping_nodes(nodes: &[TreeNode]) -> usize {
    let mut ranges: Vec<Coordinates> = nodes
        .iter()
        .map(|node| node.coordinates)
        .filter(|c| c.left < c.right)
        .collect();
    ranges.sort_by(|a, b| a.left.cmp(&b.left).then(b.right.cmp(&a.right)));

    let mut stack: Vec<Coordinates> = Vec::new();
    let mut conflicts = 0;
    for range in ranges {
        while stack.last().is_some_and(|top| top.right < range.left) {
            stack.pop();
        }
        if let Some(top) = stack.last() {
            if !top.strictly_contains(&range) {
                conflicts += 1;
                continue;
            }
        }
        stack.push(range);
    }
    conflicts
}

/// How siblings are ordered while renumbering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SiblingOrder {
    /// By `record_ordering`, ties broken by id. Used by a full rebuild.
    Ordering,
    /// By the current `left`, ties broken by id. Keeps the visible order.
    Position,
}

/// Recompute every node's coordinates from `parent_id` alone.
///
/// Nodes whose parent is not live are numbered as roots. Fails without
/// producing anything if a parent cycle makes some nodes unreachable.
pub fn plan_rebuild(nodes: &[TreeNode], order: SiblingOrder) -> Result<Vec<(NodeId, Coordinates)>> {
    let live: HashSet<NodeId> = nodes.iter().map(|node| node.id).collect();
    let mut children: HashMap<Option<NodeId>, Vec<&TreeNode>> = HashMap::new();

    for node in nodes {
        let parent = node.parent_id.filter(|parent| live.contains(parent));
        if parent.is_none() && node.parent_id.is_some() {
            warn!(id = %node.id, parent = ?node.parent_id, "numbering orphaned node as a root");
        }
        children.entry(parent).or_default().push(node);
    }

    for siblings in children.values_mut() {
        match order {
            SiblingOrder::Ordering => {
                siblings.sort_by_key(|node| (node.coordinates.ordering, node.id));
            }
            SiblingOrder::Position => {
                siblings.sort_by_key(|node| (node.coordinates.left, node.id));
            }
        }
    }

    struct Frame {
        id: NodeId,
        left: i64,
        depth: i64,
        ordering: i64,
        next_child: usize,
    }

    let mut planned = Vec::with_capacity(nodes.len());
    let mut counter = 1;
    let roots = children.get(&None).cloned().unwrap_or_default();

    for (index, root) in roots.iter().enumerate() {
        let mut stack = vec![Frame {
            id: root.id,
            left: counter,
            depth: 0,
            ordering: index as i64 + 1,
            next_child: 0,
        }];
        counter += 1;

        while let Some(frame) = stack.last_mut() {
            let kids = children.get(&Some(frame.id)).map_or(&[][..], Vec::as_slice);
            if let Some(child) = kids.get(frame.next_child) {
                frame.next_child += 1;
                let next = Frame {
                    id: child.id,
                    left: counter,
                    depth: frame.depth + 1,
                    ordering: frame.next_child as i64,
                    next_child: 0,
                };
                counter += 1;
                stack.push(next);
            } else if let Some(done) = stack.pop() {
                planned.push((
                    done.id,
                    Coordinates::new(done.left, counter, done.depth, done.ordering),
                ));
                counter += 1;
            }
        }
    }

    if planned.len() != nodes.len() {
        return Err(NestedSetError::invalid_operation(format!(
            "cannot rebuild: {} node(s) are unreachable from any root (parent cycle)",
            nodes.len() - planned.len()
        )));
    }

    Ok(planned)
}

/// Load the live nodes, plan new coordinates and write them back.
///
/// Returns the number of renumbered nodes. Runs without a transaction of its
/// own; `NestedSetManager` wraps it in a locked one.
pub async fn renumber<S>(store: &S, order: SiblingOrder) -> Result<usize>
where
    S: CoordinateStore + ?Sized,
{
    let nodes = store.live_nodes().await?;
    let planned = plan_rebuild(&nodes, order)?;
    store.write_many(&planned).await?;
    debug!(nodes = planned.len(), ?order, "renumbered tree");
    Ok(planned.len())
}
