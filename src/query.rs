//! Range predicates for the read side of the tree.
//!
//! Every read is a [`TreeQuery`]. A query renders to a SQL predicate for
//! [`SqlStore`](crate::store::SqlStore) and evaluates in Rust for
//! [`MemoryStore`](crate::store::MemoryStore), so both stores answer the same
//! question the same way.

use sea_orm::Value;

use crate::config::NestedSetConfig;
use crate::error::Result;
use crate::node::{Coordinates, NodeId, Page, TreeNode, TreeStatistics};
use crate::store::CoordinateStore;

/// A read request against one table's tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TreeQuery {
    /// Nodes whose `left` lies strictly inside the range.
    Descendants(Coordinates),
    /// Nodes whose range strictly contains the range.
    Ancestors(Coordinates),
    /// Ancestors plus the node itself.
    Path(Coordinates),
    /// The node and its descendants.
    Subtree(Coordinates),
    Siblings {
        id: NodeId,
        parent_id: Option<NodeId>,
    },
    Children(NodeId),
    Roots,
    /// Nodes without live children.
    Leaves,
    Level(i64),
    All,
}

impl TreeQuery {
    /// Evaluate the predicate against one live row.
    ///
    /// `has_children` is only consulted for [`TreeQuery::Leaves`].
    pub fn matches(&self, node: &TreeNode, has_children: impl FnOnce(NodeId) -> bool) -> bool {
        let c = &node.coordinates;
        match self {
            TreeQuery::Descendants(range) => range.left < c.left && c.left < range.right,
            TreeQuery::Ancestors(range) => c.left < range.left && range.right < c.right,
            TreeQuery::Path(range) => c.left <= range.left && range.right <= c.right,
            TreeQuery::Subtree(range) => range.left <= c.left && c.right <= range.right,
            TreeQuery::Siblings { id, parent_id } => {
                node.parent_id == *parent_id && node.id != *id
            }
            TreeQuery::Children(parent) => node.parent_id == Some(*parent),
            TreeQuery::Roots => node.parent_id.is_none(),
            TreeQuery::Leaves => !has_children(node.id),
            TreeQuery::Level(depth) => c.depth == *depth,
            TreeQuery::All => true,
        }
    }

    /// Render the predicate against the table aliased as `n`.
    pub(crate) fn render(&self, cols: &Columns, params: &mut Params) -> String {
        let left = format!("n.{}", cols.left);
        let right = format!("n.{}", cols.right);
        match self {
            TreeQuery::Descendants(range) => format!(
                "{left} > {} AND {left} < {}",
                params.push(range.left),
                params.push(range.right)
            ),
            TreeQuery::Ancestors(range) => format!(
                "{left} < {} AND {right} > {}",
                params.push(range.left),
                params.push(range.right)
            ),
            TreeQuery::Path(range) => format!(
                "{left} <= {} AND {right} >= {}",
                params.push(range.left),
                params.push(range.right)
            ),
            TreeQuery::Subtree(range) => format!(
                "{left} >= {} AND {right} <= {}",
                params.push(range.left),
                params.push(range.right)
            ),
            TreeQuery::Siblings { id, parent_id } => format!(
                "n.{} IS NOT DISTINCT FROM {} AND n.{} <> {}",
                cols.parent,
                params.push(*parent_id),
                cols.id,
                params.push(*id)
            ),
            TreeQuery::Children(parent) => {
                format!("n.{} = {}", cols.parent, params.push(*parent))
            }
            TreeQuery::Roots => format!("n.{} IS NULL", cols.parent),
            TreeQuery::Leaves => format!(
                "NOT EXISTS (SELECT 1 FROM {table} c WHERE c.{parent} = n.{id} AND c.{deleted} IS NULL)",
                table = cols.table,
                parent = cols.parent,
                id = cols.id,
                deleted = cols.deleted_at
            ),
            TreeQuery::Level(depth) => format!("n.{} = {}", cols.depth, params.push(*depth)),
            TreeQuery::All => "TRUE".to_string(),
        }
    }
}

/// Quoted identifiers for one table.
#[derive(Clone, Debug)]
pub(crate) struct Columns {
    pub table: String,
    pub id: String,
    pub parent: String,
    pub left: String,
    pub right: String,
    pub depth: String,
    pub ordering: String,
    pub deleted_at: String,
}

impl Columns {
    pub fn new(config: &NestedSetConfig) -> Self {
        let table = match config.schema() {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(config.table())),
            None => quote_ident(config.table()),
        };
        Self {
            table,
            id: quote_ident(config.id_column()),
            parent: quote_ident(config.parent_column()),
            left: quote_ident(config.left_column()),
            right: quote_ident(config.right_column()),
            depth: quote_ident(config.depth_column()),
            ordering: quote_ident(config.ordering_column()),
            deleted_at: quote_ident(config.deleted_at_column()),
        }
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Positional bind values (`$1`, `$2`, ...) for one statement.
#[derive(Debug, Default)]
pub(crate) struct Params {
    values: Vec<Value>,
}

impl Params {
    pub fn push(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

pub async fn descendants<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    store.select_ids(&TreeQuery::Descendants(range), page).await
}

/// Ancestors ordered root first.
pub async fn ancestors<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    store.select_ids(&TreeQuery::Ancestors(range), page).await
}

/// Ancestors plus the node itself, root first.
pub async fn path<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    store.select_ids(&TreeQuery::Path(range), page).await
}

pub async fn subtree<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    store.select_ids(&TreeQuery::Subtree(range), page).await
}

pub async fn siblings<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    let node = store.get_node(id).await?;
    let query = TreeQuery::Siblings {
        id,
        parent_id: node.parent_id,
    };
    store.select_ids(&query, page).await
}

pub async fn children<S>(store: &S, id: NodeId, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    store.get_node(id).await?;
    store.select_ids(&TreeQuery::Children(id), page).await
}

pub async fn roots<S>(store: &S, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    store.select_ids(&TreeQuery::Roots, page).await
}

/// Every live node, in nested-set order.
pub async fn tree<S>(store: &S, page: Page) -> Result<Vec<NodeId>>
where
    S: CoordinateStore + ?Sized,
{
    store.select_ids(&TreeQuery::All, page).await
}

/// Live nodes in the node's subtree, the node itself included.
pub async fn subtree_size<S>(store: &S, id: NodeId) -> Result<i64>
where
    S: CoordinateStore + ?Sized,
{
    let range = store.get_coordinates(id).await?;
    store.count(&TreeQuery::Subtree(range)).await
}

pub async fn tree_height<S>(store: &S) -> Result<i64>
where
    S: CoordinateStore + ?Sized,
{
    store.max_depth().await
}

pub async fn level_width<S>(store: &S, level: i64) -> Result<i64>
where
    S: CoordinateStore + ?Sized,
{
    store.count(&TreeQuery::Level(level)).await
}

pub async fn tree_statistics<S>(store: &S) -> Result<TreeStatistics>
where
    S: CoordinateStore + ?Sized,
{
    Ok(TreeStatistics {
        total_nodes: store.count(&TreeQuery::All).await?,
        root_count: store.count(&TreeQuery::Roots).await?,
        leaf_count: store.count(&TreeQuery::Leaves).await?,
        height: store.max_depth().await?,
        max_right: store.max_right().await?,
        levels: store.level_widths().await?,
    })
}
