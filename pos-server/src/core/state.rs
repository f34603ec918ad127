use std::sync::Arc;

use crate::core::{BackgroundTasks, Config, Result, ServerError, TaskKind};
use crate::db::DbService;
use crate::inventory::InventoryLedger;
use crate::notify::{self, BroadcastNotifier, OrderNotifier};
use crate::orders::{OrdersManager, PipelineSettings};
use crate::payments::{ExpirySweeper, MidtransConfig, MidtransGateway, PaymentGateway};

/// Capacity of the event channel feeding downstream observers
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Server state, shared by every handler
///
/// Cheap to clone: every service is a pool handle or an `Arc`.
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | immutable configuration |
/// | db | SQLite pool |
/// | orders | transaction orchestrator |
/// | inventory | manual ledger operations |
/// | events | broadcast port for downstream observers |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub orders: OrdersManager,
    pub inventory: InventoryLedger,
    pub events: Arc<BroadcastNotifier>,
}

impl ServerState {
    /// Open the database and wire the services with the configured gateway
    pub async fn initialize(config: &Config) -> Result<Self> {
        let db = DbService::new(&config.database_path)
            .await
            .map_err(|e| ServerError::Database(e.to_string()))?;

        let gateway = MidtransGateway::new(MidtransConfig {
            server_key: config.gateway_server_key.clone(),
            production: config.gateway_production,
            snap_base_url: config.gateway_snap_url.clone(),
            api_base_url: config.gateway_api_url.clone(),
            timeout: config.gateway_timeout,
        })
        .map_err(|e| ServerError::Gateway(e.to_string()))?;

        Ok(Self::with_gateway(config.clone(), db, Arc::new(gateway)))
    }

    /// Wire the services around an already open database and a gateway
    pub fn with_gateway(config: Config, db: DbService, gateway: Arc<dyn PaymentGateway>) -> Self {
        let events = Arc::new(BroadcastNotifier::new(EVENT_CHANNEL_CAPACITY));
        let notifier: Arc<dyn OrderNotifier> = events.clone();
        let settings = PipelineSettings {
            token_expiry: config.payment_token_expiry,
            max_gateway_retries: config.max_gateway_retries,
            finish_url: config.gateway_finish_url.clone(),
        };
        let orders = OrdersManager::new(db.pool.clone(), notifier.clone(), gateway, settings);
        let inventory = InventoryLedger::new(db.pool.clone(), notifier);
        Self {
            config,
            db,
            orders,
            inventory,
            events,
        }
    }

    /// Register the periodic jobs
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let sweeper = ExpirySweeper::new(
            self.orders.clone(),
            self.config.sweep_interval,
            tasks.shutdown_token(),
        );
        tasks.spawn("expiry_sweeper", TaskKind::Periodic, sweeper.run());
        tasks.spawn(
            "event_log",
            TaskKind::Listener,
            notify::log_events(self.events.subscribe(), tasks.shutdown_token()),
        );
        tasks.log_summary();
    }
}
