//! # Repository Module
//!
//! Database repository implementations for PharmaPOS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two surfaces per repository:                                           │
//! │                                                                         │
//! │  db.products().get_by_id(id)        &self, borrows a pooled connection  │
//! │                                     for one read                        │
//! │                                                                         │
//! │  ProductRepository::find(conn, id)  associated fn on an explicit        │
//! │  ProductRepository::write_stock(..) connection, so the services can     │
//! │                                     chain them inside one UnitOfWork    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and versioned stock writes
//! - [`LotRepository`](lot::LotRepository) - Lots and versioned quantity writes
//! - [`MovementRepository`](movement::MovementRepository) - Append-only movement log
//! - [`CashSessionRepository`](cash_session::CashSessionRepository) - Sessions and withdrawals
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers and lines

pub mod cash_session;
pub mod lot;
pub mod movement;
pub mod product;
pub mod sale;
