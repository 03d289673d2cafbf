//! # Cash Session Repository
//!
//! Storage for register sessions and their withdrawals.
//!
//! ## The Single Open Session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CREATE UNIQUE INDEX idx_cash_sessions_single_open                      │
//! │      ON cash_sessions(status) WHERE status = 'open';                    │
//! │                                                                         │
//! │  insert_open_if_absent():  INSERT OR IGNORE ...                         │
//! │     caller A ──► row inserted ─────────────┐                            │
//! │     caller B ──► ignored (index conflict) ─┴─► both find_open() → same  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pharmapos_core::{CashSession, CashWithdrawal};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const SESSION_COLUMNS: &str = r#"
    id, register_number, cashier_id, cashier_name, supervisor_id, supervisor_name,
    opened_at, closed_at, opening_fund_cents, cash_sales_cents, card_sales_cents,
    transfer_sales_cents, total_sales_cents, total_refunds_cents, withdrawals_cents,
    declared_cash_cents, expected_cash_cents, difference_cents, sale_count,
    cancellation_count, status, notes, created_at, sync_version
"#;

const WITHDRAWAL_COLUMNS: &str =
    "id, session_id, amount_cents, reason, authorized_by, notes, created_at";

#[derive(Debug, Clone)]
pub struct CashSessionRepository {
    pool: SqlitePool,
}

impl CashSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashSessionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// All sessions, most recently opened first.
    pub async fn history(&self) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions ORDER BY opened_at DESC, id DESC"
        );
        let sessions = sqlx::query_as::<_, CashSession>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    /// Withdrawals recorded against a session, oldest first.
    pub async fn withdrawals(&self, session_id: &str) -> DbResult<Vec<CashWithdrawal>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM cash_withdrawals \
             WHERE session_id = ?1 ORDER BY created_at, id"
        );
        let withdrawals = sqlx::query_as::<_, CashWithdrawal>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(withdrawals)
    }

    pub async fn count_open(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cash_sessions WHERE status = 'open'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Connection-level operations
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = ?1");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    pub async fn find_open(conn: &mut SqliteConnection) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE status = 'open'");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Inserts `session` unless another open session already exists.
    ///
    /// ## Returns
    /// `true` when this call created the row.
    pub async fn insert_open_if_absent(
        conn: &mut SqliteConnection,
        session: &CashSession,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO cash_sessions (
                id, register_number, cashier_id, cashier_name, supervisor_id, supervisor_name,
                opened_at, closed_at, opening_fund_cents, cash_sales_cents, card_sales_cents,
                transfer_sales_cents, total_sales_cents, total_refunds_cents, withdrawals_cents,
                declared_cash_cents, expected_cash_cents, difference_cents, sale_count,
                cancellation_count, status, notes, created_at, sync_version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19,
                ?20, ?21, ?22, ?23, ?24
            )
            "#,
        )
        .bind(&session.id)
        .bind(session.register_number)
        .bind(&session.cashier_id)
        .bind(&session.cashier_name)
        .bind(&session.supervisor_id)
        .bind(&session.supervisor_name)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .bind(session.opening_fund_cents)
        .bind(session.cash_sales_cents)
        .bind(session.card_sales_cents)
        .bind(session.transfer_sales_cents)
        .bind(session.total_sales_cents)
        .bind(session.total_refunds_cents)
        .bind(session.withdrawals_cents)
        .bind(session.declared_cash_cents)
        .bind(session.expected_cash_cents)
        .bind(session.difference_cents)
        .bind(session.sale_count)
        .bind(session.cancellation_count)
        .bind(session.status)
        .bind(&session.notes)
        .bind(session.created_at)
        .bind(session.sync_version)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Persists every mutable column if the row is still at `session.sync_version`.
    ///
    /// On success the in-memory session is bumped to the stored version.
    pub async fn save(conn: &mut SqliteConnection, session: &mut CashSession) -> DbResult<()> {
        debug!(
            id = %session.id,
            status = %session.status,
            total_sales = session.total_sales_cents,
            "Saving cash session"
        );

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                supervisor_id = ?3,
                supervisor_name = ?4,
                closed_at = ?5,
                cash_sales_cents = ?6,
                card_sales_cents = ?7,
                transfer_sales_cents = ?8,
                total_sales_cents = ?9,
                total_refunds_cents = ?10,
                withdrawals_cents = ?11,
                declared_cash_cents = ?12,
                expected_cash_cents = ?13,
                difference_cents = ?14,
                sale_count = ?15,
                cancellation_count = ?16,
                status = ?17,
                notes = ?18,
                sync_version = sync_version + 1
            WHERE id = ?1 AND sync_version = ?2
            "#,
        )
        .bind(&session.id)
        .bind(session.sync_version)
        .bind(&session.supervisor_id)
        .bind(&session.supervisor_name)
        .bind(session.closed_at)
        .bind(session.cash_sales_cents)
        .bind(session.card_sales_cents)
        .bind(session.transfer_sales_cents)
        .bind(session.total_sales_cents)
        .bind(session.total_refunds_cents)
        .bind(session.withdrawals_cents)
        .bind(session.declared_cash_cents)
        .bind(session.expected_cash_cents)
        .bind(session.difference_cents)
        .bind(session.sale_count)
        .bind(session.cancellation_count)
        .bind(session.status)
        .bind(&session.notes)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("CashSession", &session.id));
        }

        session.sync_version += 1;
        Ok(())
    }

    pub async fn insert_withdrawal(
        conn: &mut SqliteConnection,
        withdrawal: &CashWithdrawal,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cash_withdrawals (
                id, session_id, amount_cents, reason, authorized_by, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&withdrawal.id)
        .bind(&withdrawal.session_id)
        .bind(withdrawal.amount_cents)
        .bind(&withdrawal.reason)
        .bind(&withdrawal.authorized_by)
        .bind(&withdrawal.notes)
        .bind(withdrawal.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use pharmapos_core::register::RegisterSettings;

    fn fresh(id: &str) -> CashSession {
        CashSession::open(id.to_string(), &RegisterSettings::default(), Utc::now())
    }

    #[tokio::test]
    async fn test_second_open_session_is_ignored() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(CashSessionRepository::insert_open_if_absent(&mut conn, &fresh("s1"))
            .await
            .unwrap());
        assert!(!CashSessionRepository::insert_open_if_absent(&mut conn, &fresh("s2"))
            .await
            .unwrap());

        let open = CashSessionRepository::find_open(&mut conn).await.unwrap().unwrap();
        assert_eq!(open.id, "s1");
        drop(conn);

        assert_eq!(db.cash_sessions().count_open().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_plain_insert_of_second_open_session_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        CashSessionRepository::insert_open_if_absent(&mut conn, &fresh("s1"))
            .await
            .unwrap();

        let err = sqlx::query(
            "INSERT INTO cash_sessions (id, opened_at, created_at, status) \
             VALUES ('s2', datetime('now'), datetime('now'), 'open')",
        )
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)
        .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        CashSessionRepository::insert_open_if_absent(&mut conn, &fresh("s1"))
            .await
            .unwrap();

        let mut first = CashSessionRepository::find(&mut conn, "s1").await.unwrap().unwrap();
        let mut second = first.clone();

        first.cash_sales_cents = 100;
        CashSessionRepository::save(&mut conn, &mut first).await.unwrap();
        assert_eq!(first.sync_version, 1);

        second.cash_sales_cents = 200;
        let err = CashSessionRepository::save(&mut conn, &mut second).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = CashSessionRepository::find(&mut conn, "s1").await.unwrap().unwrap();
        assert_eq!(stored.cash_sales_cents, 100);
    }
}
