//! POS Server - order to inventory to payment pipeline
//!
//! # Modules
//!
//! ```text
//! pos-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── api/           # HTTP routes and handlers
//! ├── db/            # SQLite pool and repositories
//! ├── orders/        # transaction orchestrator (create, confirm, cancel)
//! ├── payments/      # gateway adapter, webhook, expiry sweeper
//! ├── inventory/     # stock ledger
//! ├── notify.rs      # post-commit events
//! └── utils/         # logging, error re-exports
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod utils;

pub use core::{Config, Server, ServerState};
pub use inventory::InventoryLedger;
pub use notify::{BroadcastNotifier, NoopNotifier, OrderNotifier, PosEvent};
pub use orders::{OrdersManager, PipelineError, PipelineResult, PipelineSettings};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};
