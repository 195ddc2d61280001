//! Nested-set hierarchies for SeaORM (PostgreSQL).
//!
//! Trees are stored as `(left, right, depth, ordering)` ranges next to a
//! `parent_id` edge, so subtree, ancestor and level queries are single range
//! scans. One [`NestedSetManager`] serves any table that carries the tree
//! columns; [`NestedSetRepository`] adds typed access for SeaORM models that
//! derive [`NestedSetModel`].

pub mod algorithm;
pub mod config;
pub mod consistency;
pub mod error;
pub mod lock;
pub mod manager;
pub mod node;
pub mod query;
pub mod repository;
pub mod store;
pub mod traits;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{NestedSetConfig, NestedSetOptions};
    pub use crate::manager::NestedSetManager;
    pub use crate::node::{Coordinates, NodeId, Page, TreeNode};
    pub use crate::repository::NestedSetRepository;
    pub use crate::traits::NestedSetModel;
}

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

pub use config::{
    AdvisoryLockKey, AdvisoryLockStrategy, NestedSetConfig, NestedSetOptions,
    TransactionIsolation,
};
pub use consistency::{ProblemKind, SiblingOrder, TreeProblem, ValidationReport};
pub use error::NestedSetError;
pub use manager::NestedSetManager;
pub use nested_set_macros::NestedSetModel as NestedSetModelDerive;
#[doc(hidden)]
pub use nested_set_macros::NestedSetModel;
pub use node::{Coordinates, LevelWidth, NodeId, Page, TreeNode, TreeStatistics};
pub use query::TreeQuery;
pub use repository::NestedSetRepository;
pub use store::{CoordinateStore, MemoryStore, SqlStore};
pub use traits::NestedSetModel;
