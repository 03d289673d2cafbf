//! # pharmapos-db: Database Layer for PharmaPOS
//!
//! SQLite persistence and every transaction boundary of the point of sale:
//! the stock ledger, the cash register and sale completion.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PharmaPOS Data Flow                              │
//! │                                                                         │
//! │  Checkout (complete sale)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   pharmapos-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌────────────────┐   ┌───────────────┐   ┌───────────────┐    │    │
//! │  │   │ SaleCompletion │──►│  StockLedger  │   │ CashRegister  │    │    │
//! │  │   │                │──────────────────────►│               │    │    │
//! │  │   └────────────────┘   └───────────────┘   └───────────────┘    │    │
//! │  │            │                   │                   │            │    │
//! │  │            ▼                   ▼                   ▼            │    │
//! │  │   ┌─────────────────────────────────────────────────────────┐   │    │
//! │  │   │   UnitOfWork (one transaction)  ·  Repositories         │   │    │
//! │  │   └─────────────────────────────────────────────────────────┘   │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (WAL)                       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Terminal configuration (TOML + environment)
//! - [`pool`] - Connection pool creation and service access
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`unit_of_work`] - Transaction handle shared by composed operations
//! - [`repository`] - Row-level persistence (product, lot, movement, ...)
//! - [`ledger`] - Stock movements and the append-only movement log
//! - [`cash_register`] - Cash session lifecycle
//! - [`sale_completion`] - Atomic sale completion
//! - [`retry`] - Opt-in retry of conflicting operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmapos_db::{Database, PosConfig};
//!
//! let config = PosConfig::load(None)?;
//! config.init_tracing();
//!
//! let db = Database::new(config.db_config())
//!     .await?
//!     .with_register(config.register_settings());
//!
//! let sale = db.sale_completion().complete(draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash_register;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;
pub mod sale_completion;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use cash_register::{CashRegister, CloseRequest};
pub use config::PosConfig;
pub use error::{DbError, DbResult};
pub use ledger::{MovementRequest, StockLedger};
pub use pool::{Database, DbConfig};
pub use retry::{retry_on_conflict, RetryPolicy};
pub use sale_completion::SaleCompletion;
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::cash_session::CashSessionRepository;
pub use repository::lot::LotRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
