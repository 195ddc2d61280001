use std::marker::PhantomData;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};

use crate::error::NestedSetError;
use crate::lock::LockedTransaction;
use crate::manager::NestedSetManager;
use crate::node::{NodeId, Page};
use crate::query::quote_ident;
use crate::traits::NestedSetModel;

/// Repository exposing nested-set operations in terms of full models.
#[derive(Debug)]
pub struct NestedSetRepository<M>
where
    M: NestedSetModel,
{
    manager: NestedSetManager,
    _marker: PhantomData<M>,
}

impl<M> Default for NestedSetRepository<M>
where
    M: NestedSetModel,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> NestedSetRepository<M>
where
    M: NestedSetModel,
{
    pub fn new() -> Self {
        Self {
            manager: NestedSetManager::for_model::<M>(),
            _marker: PhantomData,
        }
    }

    /// The id-level manager for the same table.
    pub fn manager(&self) -> &NestedSetManager {
        &self.manager
    }

    /// Insert `active` as the right-most child of `parent` (or as a new root).
    ///
    /// The coordinates and parent are filled in by the engine; the gap and the
    /// row are written in one transaction.
    pub async fn insert(
        &self,
        conn: &DatabaseConnection,
        active: M::ActiveModel,
        parent: Option<&M>,
        base_ordering: i64,
    ) -> Result<M, NestedSetError> {
        NestedSetManager::ensure_postgres(conn)?;
        let parent_id = parent.map(M::id);
        let guard = LockedTransaction::acquire(self.manager.config(), conn).await?;
        let result = self
            .insert_on(guard.connection(), active, parent_id, base_ordering)
            .await;
        NestedSetManager::finish(guard, result).await
    }

    async fn insert_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        mut active: M::ActiveModel,
        parent_id: Option<NodeId>,
        base_ordering: i64,
    ) -> Result<M, NestedSetError> {
        let coordinates = self
            .manager
            .create_node_in(conn, parent_id, base_ordering)
            .await?;
        M::set_parent(&mut active, parent_id);
        M::set_coordinates(&mut active, &coordinates)?;
        let model = active.insert(conn).await?;
        Ok(model)
    }

    /// Live model by id.
    pub async fn find(
        &self,
        conn: &DatabaseConnection,
        id: NodeId,
    ) -> Result<Option<M>, NestedSetError> {
        let deleted = quote_ident(self.manager.config().deleted_at_column());
        let model = M::Entity::find()
            .filter(M::id_column().eq(id))
            .filter(Expr::cust(format!("{deleted} IS NULL")))
            .one(conn)
            .await?;
        Ok(model)
    }

    pub async fn children(
        &self,
        conn: &DatabaseConnection,
        model: &M,
    ) -> Result<Vec<M>, NestedSetError> {
        let ids = self.manager.children(conn, model.id(), Page::all()).await?;
        self.load(conn, ids).await
    }

    /// Ancestors, root first.
    pub async fn ancestors(
        &self,
        conn: &DatabaseConnection,
        model: &M,
    ) -> Result<Vec<M>, NestedSetError> {
        let ids = self.manager.ancestors(conn, model.id(), Page::all()).await?;
        self.load(conn, ids).await
    }

    pub async fn descendants(
        &self,
        conn: &DatabaseConnection,
        model: &M,
    ) -> Result<Vec<M>, NestedSetError> {
        let ids = self.manager.descendants(conn, model.id(), Page::all()).await?;
        self.load(conn, ids).await
    }

    pub async fn self_and_descendants(
        &self,
        conn: &DatabaseConnection,
        model: &M,
    ) -> Result<Vec<M>, NestedSetError> {
        let ids = self.manager.subtree(conn, model.id(), Page::all()).await?;
        self.load(conn, ids).await
    }

    pub async fn move_to(
        &self,
        conn: &DatabaseConnection,
        model: &M,
        new_parent: Option<&M>,
    ) -> Result<(), NestedSetError> {
        self.manager
            .move_subtree(conn, model.id(), new_parent.map(M::id))
            .await
    }

    /// Soft-delete the model and its descendants.
    pub async fn delete(&self, conn: &DatabaseConnection, model: &M) -> Result<u64, NestedSetError> {
        self.manager.delete_subtree(conn, model.id()).await
    }

    async fn load<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: Vec<NodeId>,
    ) -> Result<Vec<M>, NestedSetError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = M::Entity::find()
            .filter(M::id_column().is_in(ids))
            .order_by_asc(M::left_column())
            .all(conn)
            .await?;
        Ok(models)
    }
}
