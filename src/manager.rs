use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend};
use tracing::{instrument, warn};

use crate::algorithm;
use crate::config::NestedSetConfig;
use crate::consistency::{self, SiblingOrder, ValidationReport};
use crate::error::{NestedSetError, Result};
use crate::lock::LockedTransaction;
use crate::node::{Coordinates, NodeId, Page, TreeNode, TreeStatistics};
use crate::query;
use crate::store::{CoordinateStore, SqlStore};
use crate::traits::NestedSetModel;

/// Entry point for nested-set operations on one table.
///
/// Every mutation runs in its own [`LockedTransaction`] and either commits in
/// full or rolls back. Reads go straight to the connection.
#[derive(Clone, Debug)]
pub struct NestedSetManager {
    config: NestedSetConfig,
}

impl NestedSetManager {
    pub fn new(config: NestedSetConfig) -> Self {
        Self { config }
    }

    /// Manager for the table behind a [`NestedSetModel`].
    pub fn for_model<M: NestedSetModel>() -> Self {
        Self::new(M::nested_set_config().clone())
    }

    pub fn config(&self) -> &NestedSetConfig {
        &self.config
    }

    pub(crate) fn ensure_postgres(conn: &impl ConnectionTrait) -> Result<()> {
        if conn.get_database_backend() == DbBackend::Postgres {
            Ok(())
        } else {
            Err(NestedSetError::UnsupportedBackend)
        }
    }

    pub(crate) fn store<'a, C: ConnectionTrait>(&self, conn: &'a C) -> SqlStore<'a, C> {
        SqlStore::new(conn, &self.config)
    }

    /// Commit when `result` is `Ok`, roll back otherwise.
    pub(crate) async fn finish<T>(guard: LockedTransaction, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                guard.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let _ = guard.rollback().await;
                Err(err)
            }
        }
    }

    /// Reserve coordinates for a new node and open its gap.
    ///
    /// The row itself is not written. Use [`insert_node`](Self::insert_node),
    /// or [`create_node_in`](Self::create_node_in) inside your own transaction
    /// when the row needs more than the tree columns.
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn create_node(
        &self,
        db: &DatabaseConnection,
        parent: Option<NodeId>,
        base_ordering: i64,
    ) -> Result<Coordinates> {
        Self::ensure_postgres(db)?;
        let guard = LockedTransaction::acquire(&self.config, db).await?;
        let result = algorithm::create_node(&self.store(guard.connection()), parent, base_ordering).await;
        Self::finish(guard, result).await
    }

    /// [`create_node`](Self::create_node) on a connection the caller controls.
    ///
    /// `conn` should be a transaction that also writes the row; otherwise a
    /// concurrent reader may see the shifted ranges before the node exists.
    pub async fn create_node_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: Option<NodeId>,
        base_ordering: i64,
    ) -> Result<Coordinates> {
        Self::ensure_postgres(conn)?;
        algorithm::create_node(&self.store(conn), parent, base_ordering).await
    }

    /// Create the coordinates and insert a row holding only the tree columns.
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn insert_node(
        &self,
        db: &DatabaseConnection,
        id: NodeId,
        parent: Option<NodeId>,
        base_ordering: i64,
    ) -> Result<TreeNode> {
        Self::ensure_postgres(db)?;
        let guard = LockedTransaction::acquire(&self.config, db).await?;
        let result =
            algorithm::insert_node(&self.store(guard.connection()), id, parent, base_ordering).await;
        Self::finish(guard, result).await
    }

    /// Move `id` and its descendants under `new_parent` (or to the root level).
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn move_subtree(
        &self,
        db: &DatabaseConnection,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<()> {
        Self::ensure_postgres(db)?;
        let guard = LockedTransaction::acquire(&self.config, db).await?;
        let result = algorithm::move_subtree(&self.store(guard.connection()), id, new_parent).await;
        Self::finish(guard, result).await
    }

    /// Soft-delete `id` and its descendants; returns the number of rows marked.
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn delete_subtree(&self, db: &DatabaseConnection, id: NodeId) -> Result<u64> {
        Self::ensure_postgres(db)?;
        let guard = LockedTransaction::acquire(&self.config, db).await?;
        let result = algorithm::delete_subtree(&self.store(guard.connection()), id).await;
        Self::finish(guard, result).await
    }

    pub async fn node(&self, db: &DatabaseConnection, id: NodeId) -> Result<TreeNode> {
        Self::ensure_postgres(db)?;
        self.store(db).get_node(id).await
    }

    pub async fn ancestors(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::ancestors(&self.store(db), id, page).await
    }

    pub async fn descendants(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::descendants(&self.store(db), id, page).await
    }

    pub async fn siblings(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::siblings(&self.store(db), id, page).await
    }

    pub async fn path(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::path(&self.store(db), id, page).await
    }

    pub async fn subtree(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::subtree(&self.store(db), id, page).await
    }

    pub async fn children(&self, db: &DatabaseConnection, id: NodeId, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::children(&self.store(db), id, page).await
    }

    pub async fn roots(&self, db: &DatabaseConnection, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::roots(&self.store(db), page).await
    }

    pub async fn tree(&self, db: &DatabaseConnection, page: Page) -> Result<Vec<NodeId>> {
        Self::ensure_postgres(db)?;
        query::tree(&self.store(db), page).await
    }

    pub async fn subtree_size(&self, db: &DatabaseConnection, id: NodeId) -> Result<i64> {
        Self::ensure_postgres(db)?;
        query::subtree_size(&self.store(db), id).await
    }

    pub async fn tree_height(&self, db: &DatabaseConnection) -> Result<i64> {
        Self::ensure_postgres(db)?;
        query::tree_height(&self.store(db)).await
    }

    pub async fn level_width(&self, db: &DatabaseConnection, level: i64) -> Result<i64> {
        Self::ensure_postgres(db)?;
        query::level_width(&self.store(db), level).await
    }

    pub async fn tree_statistics(&self, db: &DatabaseConnection) -> Result<TreeStatistics> {
        Self::ensure_postgres(db)?;
        query::tree_statistics(&self.store(db)).await
    }

    /// Problem descriptions, one per class; empty when the tree is consistent.
    pub async fn validate_tree(&self, db: &DatabaseConnection) -> Result<Vec<String>> {
        Ok(self.validation_report(db).await?.messages())
    }

    pub async fn validation_report(&self, db: &DatabaseConnection) -> Result<ValidationReport> {
        Self::ensure_postgres(db)?;
        let nodes = self.store(db).live_nodes().await?;
        let report = consistency::validate(&nodes);
        if !report.is_consistent() {
            warn!(
                table = %self.config.table(),
                problems = ?report.messages(),
                "nested set is inconsistent"
            );
        }
        Ok(report)
    }

    /// Recompute all coordinates from `parent_id`, siblings by ordering.
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn rebuild_tree(&self, db: &DatabaseConnection) -> Result<()> {
        self.renumber(db, SiblingOrder::Ordering).await
    }

    /// Close gaps left by deletions without changing the sibling order.
    #[instrument(skip(self, db), fields(table = %self.config.table()))]
    pub async fn optimize_tree(&self, db: &DatabaseConnection) -> Result<()> {
        self.renumber(db, SiblingOrder::Position).await
    }

    async fn renumber(&self, db: &DatabaseConnection, order: SiblingOrder) -> Result<()> {
        Self::ensure_postgres(db)?;
        let guard = LockedTransaction::acquire(&self.config, db).await?;
        let result = consistency::renumber(&self.store(guard.connection()), order).await;
        Self::finish(guard, result).await.map(|_| ())
    }
}
