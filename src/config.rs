use std::time::Duration;

use crc32fast::Hasher;

/// Table descriptor: where a nested-set tree lives and how its columns are named.
///
/// The manager never needs the full entity, only these column names.
#[derive(Clone, Debug)]
pub struct NestedSetConfig {
    table: String,
    schema: Option<String>,
    id_column: String,
    parent_column: String,
    left_column: String,
    right_column: String,
    depth_column: String,
    ordering_column: String,
    deleted_at_column: String,
    advisory_lock_strategy: AdvisoryLockStrategy,
    isolation: TransactionIsolation,
    statement_timeout: Option<Duration>,
}

impl NestedSetConfig {
    /// Create a configuration for `table` using the default column names.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let default_lock = AdvisoryLockStrategy::Namespaced(AdvisoryLockKey::derived_from(&table));

        Self {
            table,
            schema: None,
            id_column: "id".to_string(),
            parent_column: "parent_id".to_string(),
            left_column: "record_left".to_string(),
            right_column: "record_right".to_string(),
            depth_column: "record_depth".to_string(),
            ordering_column: "record_ordering".to_string(),
            deleted_at_column: "deleted_at".to_string(),
            advisory_lock_strategy: default_lock,
            isolation: TransactionIsolation::default(),
            statement_timeout: None,
        }
    }

    /// Merge options produced by [`NestedSetOptions`].
    pub(crate) fn apply_options(mut self, options: NestedSetOptions) -> Self {
        if let Some(schema) = options.schema {
            self.schema = Some(schema);
        }
        if let Some(column) = options.id_column {
            self.id_column = column;
        }
        if let Some(column) = options.parent_column {
            self.parent_column = column;
        }
        if let Some(column) = options.left_column {
            self.left_column = column;
        }
        if let Some(column) = options.right_column {
            self.right_column = column;
        }
        if let Some(column) = options.depth_column {
            self.depth_column = column;
        }
        if let Some(column) = options.ordering_column {
            self.ordering_column = column;
        }
        if let Some(column) = options.deleted_at_column {
            self.deleted_at_column = column;
        }
        if let Some(strategy) = options.advisory_lock_strategy {
            self.advisory_lock_strategy = strategy;
        }
        if let Some(isolation) = options.isolation {
            self.isolation = isolation;
        }
        if let Some(timeout) = options.statement_timeout {
            self.statement_timeout = Some(timeout);
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    pub fn left_column(&self) -> &str {
        &self.left_column
    }

    pub fn right_column(&self) -> &str {
        &self.right_column
    }

    pub fn depth_column(&self) -> &str {
        &self.depth_column
    }

    pub fn ordering_column(&self) -> &str {
        &self.ordering_column
    }

    /// Nullable timestamp column marking soft-deleted rows.
    pub fn deleted_at_column(&self) -> &str {
        &self.deleted_at_column
    }

    /// Advisory lock strategy (PostgreSQL only).
    pub fn advisory_lock_strategy(&self) -> &AdvisoryLockStrategy {
        &self.advisory_lock_strategy
    }

    /// Isolation level used for mutating transactions.
    pub fn isolation(&self) -> TransactionIsolation {
        self.isolation
    }

    /// `statement_timeout` applied with `SET LOCAL` inside mutating transactions.
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }
}

/// Builder-style options layered over a [`NestedSetConfig`].
#[derive(Clone, Debug, Default)]
pub struct NestedSetOptions {
    schema: Option<String>,
    id_column: Option<String>,
    parent_column: Option<String>,
    left_column: Option<String>,
    right_column: Option<String>,
    depth_column: Option<String>,
    ordering_column: Option<String>,
    deleted_at_column: Option<String>,
    advisory_lock_strategy: Option<AdvisoryLockStrategy>,
    isolation: Option<TransactionIsolation>,
    statement_timeout: Option<Duration>,
}

impl NestedSetOptions {
    pub fn schema(mut self, value: impl Into<String>) -> Self {
        self.schema = Some(value.into());
        self
    }

    pub fn id_column(mut self, value: impl Into<String>) -> Self {
        self.id_column = Some(value.into());
        self
    }

    pub fn parent_column(mut self, value: impl Into<String>) -> Self {
        self.parent_column = Some(value.into());
        self
    }

    pub fn left_column(mut self, value: impl Into<String>) -> Self {
        self.left_column = Some(value.into());
        self
    }

    pub fn right_column(mut self, value: impl Into<String>) -> Self {
        self.right_column = Some(value.into());
        self
    }

    pub fn depth_column(mut self, value: impl Into<String>) -> Self {
        self.depth_column = Some(value.into());
        self
    }

    pub fn ordering_column(mut self, value: impl Into<String>) -> Self {
        self.ordering_column = Some(value.into());
        self
    }

    pub fn deleted_at_column(mut self, value: impl Into<String>) -> Self {
        self.deleted_at_column = Some(value.into());
        self
    }

    pub fn advisory_lock_strategy(mut self, strategy: AdvisoryLockStrategy) -> Self {
        self.advisory_lock_strategy = Some(strategy);
        self
    }

    pub fn isolation(mut self, isolation: TransactionIsolation) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn apply(self, base: NestedSetConfig) -> NestedSetConfig {
        base.apply_options(self)
    }
}

/// Isolation level requested when a mutation opens its transaction.
///
/// The advisory lock is taken by the transaction's first query, which is also
/// where a snapshot isolation level fixes its snapshot. Only `READ COMMITTED`
/// reads what the previous lock holder committed, so there is no
/// `REPEATABLE READ` option: a writer that waited for the lock would shift
/// and insert against ranges that no longer exist.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TransactionIsolation {
    /// Each statement sees every commit made before it; the advisory lock
    /// serializes writers.
    #[default]
    ReadCommitted,
    /// Whatever the server's `default_transaction_isolation` is.
    ServerDefault,
    /// Writers that overlap a concurrent one fail with SQLSTATE 40001
    /// (see [`NestedSetError::is_retryable`](crate::NestedSetError::is_retryable)).
    Serializable,
}

impl TransactionIsolation {
    pub(crate) fn level(self) -> Option<sea_orm::IsolationLevel> {
        match self {
            TransactionIsolation::ReadCommitted => Some(sea_orm::IsolationLevel::ReadCommitted),
            TransactionIsolation::ServerDefault => None,
            TransactionIsolation::Serializable => Some(sea_orm::IsolationLevel::Serializable),
        }
    }
}

/// Key used for PostgreSQL advisory locks.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdvisoryLockKey(String);

impl AdvisoryLockKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Numeric lock id passed to `pg_advisory_xact_lock`.
    pub fn lock_id(&self) -> i64 {
        let mut hasher = Hasher::new();
        hasher.update(self.0.as_bytes());
        i64::from(hasher.finalize())
    }

    fn derived_from(table: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"nested-set/");
        hasher.update(table.as_bytes());
        let crc = hasher.finalize();
        Self(format!("nested-set::{table}::{crc:x}"))
    }
}

/// Configuration describing how to acquire advisory locks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvisoryLockStrategy {
    Disabled,
    Namespaced(AdvisoryLockKey),
}

impl AdvisoryLockStrategy {
    pub fn key(&self) -> Option<&AdvisoryLockKey> {
        match self {
            AdvisoryLockStrategy::Disabled => None,
            AdvisoryLockStrategy::Namespaced(key) => Some(key),
        }
    }
}
