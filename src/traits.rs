use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, FromQueryResult, IntoActiveModel};

use crate::config::NestedSetConfig;
use crate::error::NestedSetError;
use crate::node::{Coordinates, NodeId};

/// Trait implemented by SeaORM `Model` types stored as a nested set.
///
/// Implementations are normally provided by the `#[derive(NestedSetModel)]` macro.
pub trait NestedSetModel:
    Clone + Send + Sync + 'static + IntoActiveModel<Self::ActiveModel> + FromQueryResult
{
    type Entity: EntityTrait<Model = Self>;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send;

    fn nested_set_config() -> &'static NestedSetConfig;

    fn id(&self) -> NodeId;
    fn parent_id(&self) -> Option<NodeId>;
    fn coordinates(&self) -> Coordinates;

    fn set_parent(active: &mut Self::ActiveModel, parent: Option<NodeId>);

    /// Fails when a coordinate does not fit the model's field type.
    fn set_coordinates(
        active: &mut Self::ActiveModel,
        coordinates: &Coordinates,
    ) -> Result<(), NestedSetError>;

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
    fn left_column() -> <Self::Entity as EntityTrait>::Column;
}
