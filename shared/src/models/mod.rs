//! Data models
//!
//! Shared between pos-server and front-end consumers (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), all timestamps are Unix millis.

pub mod inventory;
pub mod order;
pub mod payment;
pub mod product;

// Re-exports
pub use inventory::*;
pub use order::*;
pub use payment::*;
pub use product::*;
