//! Gateway Adapter and the gateway side of the orchestrator

pub mod expiry;
pub mod gateway;
pub mod midtrans;
pub mod request;
mod service;
pub mod signature;

pub use expiry::{ExpirySweeper, SweepReport};
pub use gateway::{
    GatewayError, GatewayOutcome, GatewayTransactionStatus, PaymentGateway, TransactionRequest,
    TransactionToken,
};
pub use midtrans::{MidtransConfig, MidtransGateway};
pub use service::{GatewayCheckout, GatewayNotification, gateway_order_id};
