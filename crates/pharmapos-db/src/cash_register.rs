//! # Cash Register
//!
//! Persistent side of the cash session: lazily opening the single open
//! session, accumulating sales into payment buckets, withdrawals, and close.
//!
//! ## Get-or-Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  current_in(conn)                                                       │
//! │    1. INSERT OR IGNORE a fresh zeroed session (status = 'open')         │
//! │         └─ the partial unique index lets exactly one open row exist;    │
//! │            a losing racer's insert is ignored, not an error             │
//! │    2. SELECT the open session  → every caller gets the same row         │
//! │                                                                         │
//! │  The insert is the first statement, so the write lock is held before    │
//! │  the SELECT and the session cannot change underneath the caller.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are only ever written through [`CashSessionRepository::save`],
//! a versioned update that fails with `ConcurrencyConflict` on a lost update.

use chrono::{DateTime, Utc};
use pharmapos_core::register::{PaymentBucket, RegisterSettings};
use pharmapos_core::validation::{validate_declared_cash, validate_withdrawal};
use pharmapos_core::{CashSession, CashWithdrawal, CoreError, Money};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::cash_session::CashSessionRepository;
use crate::unit_of_work::UnitOfWork;

/// Parameters for closing a session.
#[derive(Debug, Clone, Default)]
pub struct CloseRequest {
    /// Session to close; `None` targets the open session.
    pub session_id: Option<String>,
    /// Cash counted in the drawer.
    pub declared_cash: Money,
    pub supervisor_id: Option<String>,
    pub supervisor_name: Option<String>,
    pub notes: Option<String>,
}

impl CloseRequest {
    pub fn new(declared_cash: Money) -> Self {
        CloseRequest {
            declared_cash,
            ..Default::default()
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn supervisor(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.supervisor_id = Some(id.into());
        self.supervisor_name = Some(name.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CashRegister {
    pool: SqlitePool,
    settings: RegisterSettings,
}

impl CashRegister {
    pub fn new(pool: SqlitePool, settings: RegisterSettings) -> Self {
        CashRegister { pool, settings }
    }

    fn repo(&self) -> CashSessionRepository {
        CashSessionRepository::new(self.pool.clone())
    }

    /// The open session, created with zeroed totals if none exists.
    pub async fn current(&self) -> DbResult<CashSession> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let session = Self::current_in(uow.conn(), &self.settings, Utc::now()).await?;
        uow.commit().await?;
        Ok(session)
    }

    pub async fn current_in(
        conn: &mut SqliteConnection,
        settings: &RegisterSettings,
        now: DateTime<Utc>,
    ) -> DbResult<CashSession> {
        let fresh = CashSession::open(Uuid::new_v4().to_string(), settings, now);

        if CashSessionRepository::insert_open_if_absent(conn, &fresh).await? {
            info!(
                session_id = %fresh.id,
                register = fresh.register_number,
                opening_fund = fresh.opening_fund_cents,
                "Cash session opened"
            );
        }

        CashSessionRepository::find_open(conn)
            .await?
            .ok_or_else(|| DbError::conflict("CashSession", "open"))
    }

    /// Adds one sale to the open session.
    pub async fn accumulate(&self, amount: Money, payment_method: &str) -> DbResult<CashSession> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let session =
            Self::accumulate_in(uow.conn(), &self.settings, amount, payment_method, Utc::now())
                .await?;
        uow.commit().await?;
        Ok(session)
    }

    pub async fn accumulate_in(
        conn: &mut SqliteConnection,
        settings: &RegisterSettings,
        amount: Money,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> DbResult<CashSession> {
        // Classify first so a rejected method never opens a session.
        let bucket = PaymentBucket::resolve(payment_method, settings.unknown_payment)?;

        let mut session = Self::current_in(conn, settings, now).await?;
        session.record_sale(amount, bucket)?;
        CashSessionRepository::save(conn, &mut session).await?;

        debug!(
            session_id = %session.id,
            %bucket,
            amount = amount.cents(),
            total_sales = session.total_sales_cents,
            "Sale accumulated"
        );
        Ok(session)
    }

    /// Takes cash out of the drawer against the open session.
    pub async fn withdraw(
        &self,
        amount: Money,
        reason: &str,
        authorized_by: &str,
        notes: Option<String>,
    ) -> DbResult<CashWithdrawal> {
        validate_withdrawal(amount, reason, authorized_by)?;

        let now = Utc::now();
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let conn = uow.conn();

        let mut session = Self::current_in(conn, &self.settings, now).await?;
        session.record_withdrawal(amount)?;
        CashSessionRepository::save(conn, &mut session).await?;

        let withdrawal = CashWithdrawal {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            amount_cents: amount.cents(),
            reason: reason.trim().to_string(),
            authorized_by: authorized_by.trim().to_string(),
            notes,
            created_at: now,
        };
        CashSessionRepository::insert_withdrawal(conn, &withdrawal).await?;
        uow.commit().await?;

        info!(
            session_id = %session.id,
            amount = amount.cents(),
            authorized_by = %withdrawal.authorized_by,
            "Cash withdrawal recorded"
        );
        Ok(withdrawal)
    }

    pub async fn withdrawals(&self, session_id: &str) -> DbResult<Vec<CashWithdrawal>> {
        self.repo().withdrawals(session_id).await
    }

    /// Closes the open session with the cash counted in the drawer.
    pub async fn close(&self, declared_cash: Money) -> DbResult<CashSession> {
        self.close_with(CloseRequest::new(declared_cash)).await
    }

    /// OPEN → CLOSED, stamping expected cash and the difference.
    ///
    /// ## Errors
    /// * `InvalidState` - no session is open, or the target is already closed
    /// * `NotFound` - `request.session_id` doesn't exist
    pub async fn close_with(&self, request: CloseRequest) -> DbResult<CashSession> {
        validate_declared_cash(request.declared_cash)?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let conn = uow.conn();

        let mut session = match &request.session_id {
            Some(id) => CashSessionRepository::find(conn, id)
                .await?
                .ok_or_else(|| DbError::not_found("CashSession", id))?,
            None => CashSessionRepository::find_open(conn).await?.ok_or_else(|| {
                DbError::from(CoreError::invalid_state("CashSession", "-", "absent", "close"))
            })?,
        };

        session.close(request.declared_cash, Utc::now())?;
        if request.supervisor_id.is_some() {
            session.supervisor_id = request.supervisor_id;
            session.supervisor_name = request.supervisor_name;
        }
        if request.notes.is_some() {
            session.notes = request.notes;
        }
        CashSessionRepository::save(conn, &mut session).await?;
        uow.commit().await?;

        info!(
            session_id = %session.id,
            expected = session.expected_cash_cents,
            declared = session.declared_cash_cents,
            difference = session.difference_cents,
            status = ?session.difference_status(),
            "Cash session closed"
        );
        Ok(session)
    }

    /// All sessions, most recently opened first.
    pub async fn history(&self) -> DbResult<Vec<CashSession>> {
        self.repo().history().await
    }

    pub async fn get(&self, id: &str) -> DbResult<CashSession> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", id))
    }
}
