use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement};
use tracing::debug;

use crate::config::NestedSetConfig;
use crate::error::{NestedSetError, Result};
use crate::node::{Coordinates, LevelWidth, NodeId, Page, TreeNode};
use crate::query::{Columns, Params, TreeQuery};
use crate::store::CoordinateStore;

/// Rows per batched `UPDATE ... FROM (VALUES ...)` statement.
const WRITE_BATCH: usize = 500;

/// [`CoordinateStore`] over a SeaORM connection or transaction (PostgreSQL).
pub struct SqlStore<'a, C> {
    conn: &'a C,
    cols: Columns,
}

#[derive(Debug, FromQueryResult)]
struct NodeRow {
    id: NodeId,
    parent_id: Option<NodeId>,
    record_left: i64,
    record_right: i64,
    record_depth: i64,
    record_ordering: i64,
}

impl From<NodeRow> for TreeNode {
    fn from(row: NodeRow) -> Self {
        TreeNode::new(
            row.id,
            row.parent_id,
            Coordinates::new(
                row.record_left,
                row.record_right,
                row.record_depth,
                row.record_ordering,
            ),
        )
    }
}

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: NodeId,
}

#[derive(Debug, FromQueryResult)]
struct ScalarRow {
    value: Option<i64>,
}

impl<'a, C> SqlStore<'a, C>
where
    C: ConnectionTrait,
{
    pub fn new(conn: &'a C, config: &NestedSetConfig) -> Self {
        Self {
            conn,
            cols: Columns::new(config),
        }
    }

    fn statement(sql: String, params: Params) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, params.into_values())
    }

    fn node_columns(&self) -> String {
        let c = &self.cols;
        format!(
            "n.{id} AS id, n.{parent} AS parent_id, n.{left}::bigint AS record_left, \
             n.{right}::bigint AS record_right, n.{depth}::bigint AS record_depth, \
             n.{ordering}::bigint AS record_ordering",
            id = c.id,
            parent = c.parent,
            left = c.left,
            right = c.right,
            depth = c.depth,
            ordering = c.ordering
        )
    }

    async fn scalar(&self, expression: &str, query: &TreeQuery) -> Result<Option<i64>> {
        let mut params = Params::default();
        let predicate = query.render(&self.cols, &mut params);
        let sql = format!(
            "SELECT ({expression})::bigint AS value FROM {table} n \
             WHERE n.{deleted} IS NULL AND ({predicate})",
            table = self.cols.table,
            deleted = self.cols.deleted_at
        );
        let row = ScalarRow::find_by_statement(Self::statement(sql, params))
            .one(self.conn)
            .await?;
        Ok(row.and_then(|row| row.value))
    }

    async fn execute(&self, sql: String, params: Params) -> Result<u64> {
        let result = self.conn.execute(Self::statement(sql, params)).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<'a, C> CoordinateStore for SqlStore<'a, C>
where
    C: ConnectionTrait,
{
    async fn get_node(&self, id: NodeId) -> Result<TreeNode> {
        let mut params = Params::default();
        let sql = format!(
            "SELECT {columns} FROM {table} n WHERE n.{id_col} = {id} AND n.{deleted} IS NULL",
            columns = self.node_columns(),
            table = self.cols.table,
            id_col = self.cols.id,
            id = params.push(id),
            deleted = self.cols.deleted_at
        );
        let row = NodeRow::find_by_statement(Self::statement(sql, params))
            .one(self.conn)
            .await?;
        row.map(TreeNode::from).ok_or(NestedSetError::NotFound(id))
    }

    async fn max_right(&self) -> Result<i64> {
        let expression = format!(
            "COALESCE(MAX(n.{}) FILTER (WHERE n.{} > 0), 0)",
            self.cols.right, self.cols.left
        );
        Ok(self.scalar(&expression, &TreeQuery::All).await?.unwrap_or(0))
    }

    async fn max_child_ordering(&self, parent: Option<NodeId>) -> Result<Option<i64>> {
        let query = match parent {
            Some(parent) => TreeQuery::Children(parent),
            None => TreeQuery::Roots,
        };
        let expression = format!("MAX(n.{})", self.cols.ordering);
        self.scalar(&expression, &query).await
    }

    async fn shift_ranges(&self, pivot: i64, delta: i64) -> Result<u64> {
        let mut params = Params::default();
        let pivot_param = params.push(pivot);
        let delta_param = params.push(delta);
        let sql = format!(
            "UPDATE {table} SET \
             {right} = CASE WHEN {right} >= {pivot_param} THEN {right} + {delta_param} ELSE {right} END, \
             {left} = CASE WHEN {left} > {pivot_param} THEN {left} + {delta_param} ELSE {left} END \
             WHERE {deleted} IS NULL AND {right} >= {pivot_param}",
            table = self.cols.table,
            left = self.cols.left,
            right = self.cols.right,
            deleted = self.cols.deleted_at
        );
        let rows = self.execute(sql, params).await?;
        debug!(pivot, delta, rows, "shifted ranges");
        Ok(rows)
    }

    async fn write_coordinates(&self, id: NodeId, coordinates: &Coordinates) -> Result<()> {
        let mut params = Params::default();
        let sql = format!(
            "UPDATE {table} SET {left} = {l}, {right} = {r}, {depth} = {d}, {ordering} = {o} \
             WHERE {id_col} = {id} AND {deleted} IS NULL",
            table = self.cols.table,
            left = self.cols.left,
            right = self.cols.right,
            depth = self.cols.depth,
            ordering = self.cols.ordering,
            l = params.push(coordinates.left),
            r = params.push(coordinates.right),
            d = params.push(coordinates.depth),
            o = params.push(coordinates.ordering),
            id_col = self.cols.id,
            id = params.push(id),
            deleted = self.cols.deleted_at
        );
        match self.execute(sql, params).await? {
            0 => Err(NestedSetError::NotFound(id)),
            _ => Ok(()),
        }
    }

    async fn write_many(&self, updates: &[(NodeId, Coordinates)]) -> Result<()> {
        for batch in updates.chunks(WRITE_BATCH) {
            let mut params = Params::default();
            let rows = batch
                .iter()
                .map(|(id, c)| {
                    format!(
                        "({}::uuid, {}::bigint, {}::bigint, {}::bigint, {}::bigint)",
                        params.push(*id),
                        params.push(c.left),
                        params.push(c.right),
                        params.push(c.depth),
                        params.push(c.ordering)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {table} AS n SET {left} = v.lft, {right} = v.rgt, {depth} = v.dpt, \
                 {ordering} = v.ord FROM (VALUES {rows}) AS v(node_id, lft, rgt, dpt, ord) \
                 WHERE n.{id_col} = v.node_id",
                table = self.cols.table,
                left = self.cols.left,
                right = self.cols.right,
                depth = self.cols.depth,
                ordering = self.cols.ordering,
                id_col = self.cols.id
            );
            self.execute(sql, params).await?;
        }
        Ok(())
    }

    async fn insert_node(&self, node: &TreeNode) -> Result<()> {
        let mut params = Params::default();
        let c = &node.coordinates;
        let sql = format!(
            "INSERT INTO {table} ({id_col}, {parent}, {left}, {right}, {depth}, {ordering}) \
             VALUES ({}, {}, {}, {}, {}, {})",
            params.push(node.id),
            params.push(node.parent_id),
            params.push(c.left),
            params.push(c.right),
            params.push(c.depth),
            params.push(c.ordering),
            table = self.cols.table,
            id_col = self.cols.id,
            parent = self.cols.parent,
            left = self.cols.left,
            right = self.cols.right,
            depth = self.cols.depth,
            ordering = self.cols.ordering
        );
        self.execute(sql, params).await?;
        Ok(())
    }

    async fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        let mut params = Params::default();
        let sql = format!(
            "UPDATE {table} SET {parent_col} = {parent} WHERE {id_col} = {id} AND {deleted} IS NULL",
            table = self.cols.table,
            parent_col = self.cols.parent,
            parent = params.push(parent),
            id_col = self.cols.id,
            id = params.push(id),
            deleted = self.cols.deleted_at
        );
        match self.execute(sql, params).await? {
            0 => Err(NestedSetError::NotFound(id)),
            _ => Ok(()),
        }
    }

    async fn stage_subtree(&self, left: i64, right: i64) -> Result<u64> {
        let mut params = Params::default();
        let sql = format!(
            "UPDATE {table} SET {left_col} = -{left_col}, {right_col} = -{right_col} \
             WHERE {deleted} IS NULL AND {left_col} >= {l} AND {right_col} <= {r}",
            table = self.cols.table,
            left_col = self.cols.left,
            right_col = self.cols.right,
            deleted = self.cols.deleted_at,
            l = params.push(left),
            r = params.push(right)
        );
        self.execute(sql, params).await
    }

    async fn restore_staged(&self, offset: i64, depth_delta: i64) -> Result<u64> {
        let mut params = Params::default();
        let offset_param = params.push(offset);
        let sql = format!(
            "UPDATE {table} SET {left} = -{left} + {offset_param}, \
             {right} = -{right} + {offset_param}, {depth} = {depth} + {delta} \
             WHERE {deleted} IS NULL AND {left} < 0",
            table = self.cols.table,
            left = self.cols.left,
            right = self.cols.right,
            depth = self.cols.depth,
            delta = params.push(depth_delta),
            deleted = self.cols.deleted_at
        );
        self.execute(sql, params).await
    }

    async fn soft_delete_range(&self, left: i64, right: i64) -> Result<u64> {
        let mut params = Params::default();
        let sql = format!(
            "UPDATE {table} SET {deleted} = CURRENT_TIMESTAMP \
             WHERE {deleted} IS NULL AND {left_col} >= {l} AND {right_col} <= {r}",
            table = self.cols.table,
            deleted = self.cols.deleted_at,
            left_col = self.cols.left,
            right_col = self.cols.right,
            l = params.push(left),
            r = params.push(right)
        );
        self.execute(sql, params).await
    }

    async fn live_nodes(&self) -> Result<Vec<TreeNode>> {
        let sql = format!(
            "SELECT {columns} FROM {table} n WHERE n.{deleted} IS NULL ORDER BY n.{left}, n.{id}",
            columns = self.node_columns(),
            table = self.cols.table,
            deleted = self.cols.deleted_at,
            left = self.cols.left,
            id = self.cols.id
        );
        let rows = NodeRow::find_by_statement(Self::statement(sql, Params::default()))
            .all(self.conn)
            .await?;
        Ok(rows.into_iter().map(TreeNode::from).collect())
    }

    async fn select_ids(&self, query: &TreeQuery, page: Page) -> Result<Vec<NodeId>> {
        let mut params = Params::default();
        let predicate = query.render(&self.cols, &mut params);
        let mut sql = format!(
            "SELECT n.{id} AS id FROM {table} n WHERE n.{deleted} IS NULL AND ({predicate}) \
             ORDER BY n.{left}, n.{id}",
            id = self.cols.id,
            table = self.cols.table,
            deleted = self.cols.deleted_at,
            left = self.cols.left
        );
        if let Some(limit) = page.limit {
            let limit = params.push(i64::try_from(limit).unwrap_or(i64::MAX));
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if page.offset > 0 {
            let offset = params.push(i64::try_from(page.offset).unwrap_or(i64::MAX));
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let rows = IdRow::find_by_statement(Self::statement(sql, params))
            .all(self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn count(&self, query: &TreeQuery) -> Result<i64> {
        Ok(self.scalar("COUNT(*)", query).await?.unwrap_or(0))
    }

    async fn max_depth(&self) -> Result<i64> {
        let expression = format!("COALESCE(MAX(n.{}), 0)", self.cols.depth);
        Ok(self.scalar(&expression, &TreeQuery::All).await?.unwrap_or(0))
    }

    async fn level_widths(&self) -> Result<Vec<LevelWidth>> {
        let sql = format!(
            "SELECT n.{depth}::bigint AS depth, COUNT(*)::bigint AS width FROM {table} n \
             WHERE n.{deleted} IS NULL GROUP BY n.{depth} ORDER BY n.{depth}",
            depth = self.cols.depth,
            table = self.cols.table,
            deleted = self.cols.deleted_at
        );
        let rows = LevelWidth::find_by_statement(Self::statement(sql, Params::default()))
            .all(self.conn)
            .await?;
        Ok(rows)
    }
}
