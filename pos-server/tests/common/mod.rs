//! Test harness: temp SQLite database, scripted gateway, recorded events

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pos_server::core::Config;
use pos_server::db::DbService;
use pos_server::db::repository::product::{self as product_repo, NewProduct};
use pos_server::inventory::InventoryLedger;
use pos_server::notify::{OrderNotifier, PosEvent};
use pos_server::orders::{
    Actor, ConfirmPaymentRequest, CreateOrderRequest, OrderItemInput, OrdersManager,
    PipelineSettings,
};
use pos_server::payments::{
    GatewayError, GatewayTransactionStatus, PaymentGateway, TransactionRequest, TransactionToken,
};
use shared::models::{Order, OrderSource, OrderType, Product};
use shared::util::now_millis;
use tempfile::TempDir;

pub const SERVER_KEY: &str = "SB-Mid-server-test";

/// Gateway double: scripted responses, defaults when the script runs out
#[derive(Default)]
pub struct MockGateway {
    create_script: Mutex<VecDeque<Result<TransactionToken, GatewayError>>>,
    status_script: Mutex<VecDeque<Result<GatewayTransactionStatus, GatewayError>>>,
    pub requests: Mutex<Vec<TransactionRequest>>,
    pub status_calls: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn push_create(&self, response: Result<TransactionToken, GatewayError>) {
        self.create_script.lock().push_back(response);
    }

    pub fn push_status(&self, response: Result<GatewayTransactionStatus, GatewayError>) {
        self.status_script.lock().push_back(response);
    }

    pub fn last_request(&self) -> Option<TransactionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        self.requests.lock().push(request.clone());
        let scripted = self.create_script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            let id = &request.transaction_details.order_id;
            Ok(TransactionToken {
                token: format!("snap-{id}"),
                redirect_url: format!("https://pay.test/{id}"),
            })
        })
    }

    async fn transaction_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayTransactionStatus, GatewayError> {
        self.status_calls.lock().push(gateway_order_id.to_string());
        let scripted = self.status_script.lock().pop_front();
        scripted.unwrap_or_else(|| Err(GatewayError::NotFound(gateway_order_id.to_string())))
    }
}

/// Collects every emitted event
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<PosEvent>>,
}

impl OrderNotifier for RecordingNotifier {
    fn notify(&self, event: PosEvent) {
        self.events.lock().push(event);
    }
}

impl RecordingNotifier {
    pub fn count(&self, pred: impl Fn(&PosEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

pub struct TestEnv {
    _dir: TempDir,
    pub db: DbService,
    pub orders: OrdersManager,
    pub inventory: InventoryLedger,
    pub gateway: Arc<MockGateway>,
    pub events: Arc<RecordingNotifier>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_settings(PipelineSettings::default()).await
    }

    pub async fn with_settings(settings: PipelineSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos.db");
        let db = DbService::new(path.to_str().unwrap()).await.unwrap();
        let gateway = Arc::new(MockGateway::default());
        let events = Arc::new(RecordingNotifier::default());
        let orders = OrdersManager::new(
            db.pool.clone(),
            events.clone(),
            gateway.clone(),
            settings,
        );
        let inventory = InventoryLedger::new(db.pool.clone(), events.clone());
        Self {
            _dir: dir,
            db,
            orders,
            inventory,
            gateway,
            events,
        }
    }

    pub async fn product(&self, name: &str, price: f64, quantity: i64) -> Product {
        self.product_with(name, price, quantity, true).await
    }

    pub async fn product_with(&self, name: &str, price: f64, quantity: i64, track: bool) -> Product {
        let id = product_repo::insert(
            &self.db.pool,
            &NewProduct {
                name: name.to_string(),
                sku: None,
                price,
                cost_price: None,
                quantity,
                track_inventory: track,
                low_stock_alert: 2,
            },
            now_millis(),
        )
        .await
        .unwrap();
        self.reload_product(id).await
    }

    pub async fn reload_product(&self, id: i64) -> Product {
        product_repo::find_by_id(&self.db.pool, id).await.unwrap().unwrap()
    }

    /// Order with the given `(product, quantity)` lines at catalog price
    pub async fn order(&self, lines: &[(&Product, i64)]) -> Order {
        self.orders
            .create_order(order_request(lines), &cashier())
            .await
            .unwrap()
    }

    /// Cash order already settled with exact payment
    pub async fn paid_order(&self, lines: &[(&Product, i64)]) -> Order {
        let order = self.order(lines).await;
        self.orders
            .confirm_payment(order.id, cash(order.total_amount), &cashier())
            .await
            .unwrap()
    }
}

pub fn cashier() -> Actor {
    Actor::new(7, "cashier")
}

pub fn order_request(lines: &[(&Product, i64)]) -> CreateOrderRequest {
    CreateOrderRequest {
        order_number: None,
        order_type: OrderType::Takeaway,
        order_source: OrderSource::Cashier,
        customer_name: Some("Budi Santoso".into()),
        customer_phone: Some("+62 812-3456-7890".into()),
        customer_email: Some("budi@example.com".into()),
        table_number: None,
        notes: None,
        items: lines
            .iter()
            .map(|(product, quantity)| OrderItemInput {
                product_id: product.id,
                quantity: *quantity,
                unit_price: None,
                discount_amount: 0.0,
                tax_amount: 0.0,
                notes: None,
            })
            .collect(),
        subtotal: None,
        discount_amount: 0.0,
        tax_amount: 0.0,
        service_charge: 0.0,
        delivery_fee: 0.0,
        total_amount: None,
        payment_method: None,
    }
}

pub fn cash(paid_amount: f64) -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        paid_amount,
        change_amount: None,
        payment_method: None,
        reference_number: None,
        notes: None,
    }
}

pub fn gateway_status(gateway_order_id: &str, transaction_status: &str) -> GatewayTransactionStatus {
    GatewayTransactionStatus {
        order_id: gateway_order_id.to_string(),
        transaction_status: transaction_status.to_string(),
        fraud_status: Some("accept".into()),
        transaction_id: Some(format!("trx-{gateway_order_id}")),
        status_code: Some("200".into()),
        gross_amount: None,
        payment_type: Some("qris".into()),
    }
}

/// Configuration for router-level tests
pub fn test_config(database_path: &str) -> Config {
    Config {
        database_path: database_path.to_string(),
        http_port: 0,
        environment: "development".into(),
        gateway_server_key: SERVER_KEY.into(),
        gateway_production: false,
        gateway_snap_url: None,
        gateway_api_url: None,
        gateway_finish_url: None,
        gateway_timeout: Duration::from_secs(1),
        payment_token_expiry: Duration::from_secs(600),
        max_gateway_retries: 5,
        sweep_interval: Duration::from_secs(60),
        log_level: "debug".into(),
        log_json: false,
        log_dir: None,
    }
}
