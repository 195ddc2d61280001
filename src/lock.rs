use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait, Value,
};

use crate::config::NestedSetConfig;
use crate::error::NestedSetError;

/// A transaction holding the table's advisory lock.
///
/// The lock is taken with `pg_advisory_xact_lock`, so it is released by the
/// server on commit or rollback. Dropping the guard without committing drops
/// the inner [`DatabaseTransaction`], which rolls back.
pub struct LockedTransaction {
    txn: DatabaseTransaction,
}

impl LockedTransaction {
    pub async fn acquire(
        config: &NestedSetConfig,
        db: &DatabaseConnection,
    ) -> Result<Self, NestedSetError> {
        let txn = db.begin_with_config(config.isolation().level(), None).await?;

        if let Err(err) = prepare(&txn, config).await {
            let _ = txn.rollback().await;
            return Err(err);
        }

        Ok(Self { txn })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), NestedSetError> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), NestedSetError> {
        self.txn.rollback().await?;
        Ok(())
    }
}

async fn prepare(txn: &DatabaseTransaction, config: &NestedSetConfig) -> Result<(), NestedSetError> {
    if let Some(timeout) = config.statement_timeout() {
        // SET does not take bind parameters; the value is a plain integer.
        txn.execute(Statement::from_string(
            DbBackend::Postgres,
            format!("SET LOCAL statement_timeout = {}", timeout.as_millis()),
        ))
        .await?;
    }

    if let Some(key) = config.advisory_lock_strategy().key() {
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            vec![Value::from(key.lock_id())],
        ))
        .await?;
    }

    Ok(())
}
