//! # Unit of Work
//!
//! One explicit transactional boundary spanning every write an operation makes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = UnitOfWork::begin(&pool).await?;                         │
//! │                                                                         │
//! │  sales::insert_if_absent(uow.conn(), ..)     ── first write takes the   │
//! │  ledger.apply_in(uow.conn(), ..)                SQLite write lock       │
//! │  register.accumulate_in(uow.conn(), ..)                                 │
//! │                                                                         │
//! │  uow.commit().await?      ── all of it becomes visible at once          │
//! │                                                                         │
//! │  `?` anywhere above drops `uow` → ROLLBACK, nothing was applied         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// A database transaction staging writes until `commit`.
///
/// Dropping it without committing rolls everything back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Starts a transaction on a pooled connection.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Internal(msg) => DbError::TransactionFailed(msg),
                other => other,
            })?;
        debug!("Unit of work started");
        Ok(UnitOfWork { tx })
    }

    /// The connection every staged write must go through.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Makes every staged write durable.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards every staged write explicitly.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}
