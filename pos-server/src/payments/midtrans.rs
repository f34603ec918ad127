//! Midtrans client via REST API (no SDK dependency)
//!
//! Snap creates hosted-checkout transactions; the Core API v2 reports their
//! status. Both authenticate with HTTP basic auth, server key as username.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::gateway::{
    GatewayError, GatewayTransactionStatus, PaymentGateway, TransactionRequest, TransactionToken,
};

const SNAP_SANDBOX: &str = "https://app.sandbox.midtrans.com";
const SNAP_PRODUCTION: &str = "https://app.midtrans.com";
const API_SANDBOX: &str = "https://api.sandbox.midtrans.com";
const API_PRODUCTION: &str = "https://api.midtrans.com";

#[derive(Debug, Clone)]
pub struct MidtransConfig {
    pub server_key: String,
    pub production: bool,
    /// Overrides the Snap host (tests, proxies)
    pub snap_base_url: Option<String>,
    /// Overrides the Core API host
    pub api_base_url: Option<String>,
    pub timeout: Duration,
}

pub struct MidtransGateway {
    client: reqwest::Client,
    server_key: String,
    snap_base_url: String,
    api_base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct SnapResponse {
    token: Option<String>,
    redirect_url: Option<String>,
    #[serde(default)]
    error_messages: Vec<String>,
}

impl MidtransGateway {
    pub fn new(config: MidtransConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let (snap, api) = if config.production {
            (SNAP_PRODUCTION, API_PRODUCTION)
        } else {
            (SNAP_SANDBOX, API_SANDBOX)
        };
        Ok(Self {
            client,
            server_key: config.server_key,
            snap_base_url: config.snap_base_url.unwrap_or_else(|| snap.to_string()),
            api_base_url: config.api_base_url.unwrap_or_else(|| api.to_string()),
        })
    }

    fn trimmed(base: &str) -> &str {
        base.trim_end_matches('/')
    }
}

fn is_duplicate_message(messages: &[String]) -> bool {
    messages.iter().any(|m| {
        let m = m.to_ascii_lowercase();
        m.contains("already been taken") || m.contains("sudah digunakan")
    })
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    fn name(&self) -> &'static str {
        "midtrans"
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        let url = format!("{}/snap/v1/transactions", Self::trimmed(&self.snap_base_url));
        let order_id = &request.transaction_details.order_id;
        tracing::debug!(order_id = %order_id, gross_amount = request.transaction_details.gross_amount, "Creating gateway transaction");

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, None::<&str>)
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        // Error bodies are not always JSON; the status code still decides
        let body: SnapResponse = serde_json::from_str(&text).unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => Err(GatewayError::Auth(body.error_messages.join("; "))),
            StatusCode::CONFLICT | StatusCode::NOT_ACCEPTABLE => {
                Err(GatewayError::Duplicate(order_id.clone()))
            }
            s if s.is_client_error() && is_duplicate_message(&body.error_messages) => {
                Err(GatewayError::Duplicate(order_id.clone()))
            }
            s if s.is_success() => match (body.token, body.redirect_url) {
                (Some(token), Some(redirect_url)) => Ok(TransactionToken {
                    token,
                    redirect_url,
                }),
                _ => Err(GatewayError::InvalidResponse(
                    "token or redirect_url missing".into(),
                )),
            },
            s if s.is_server_error() => Err(GatewayError::Unavailable(format!(
                "HTTP {s}: {}",
                body.error_messages.join("; ")
            ))),
            s => Err(GatewayError::InvalidResponse(format!(
                "HTTP {s}: {}",
                body.error_messages.join("; ")
            ))),
        }
    }

    async fn transaction_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayTransactionStatus, GatewayError> {
        let url = format!("{}/v2/{gateway_order_id}/status", Self::trimmed(&self.api_base_url));
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.server_key, None::<&str>)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Auth(format!("HTTP {status}")));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(gateway_order_id.to_string()));
        }
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!("HTTP {status}")));
        }

        let body: serde_json::Value = resp.json().await?;
        // The Core API reports some failures with HTTP 200 and a body status code
        match body["status_code"].as_str() {
            Some("404") => return Err(GatewayError::NotFound(gateway_order_id.to_string())),
            Some("401") => return Err(GatewayError::Auth(body["status_message"].to_string())),
            _ => {}
        }
        serde_json::from_value(body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_detection() {
        assert!(is_duplicate_message(&[
            "transaction_details.order_id has already been taken".into()
        ]));
        assert!(is_duplicate_message(&["order_id sudah digunakan".into()]));
        assert!(!is_duplicate_message(&["gross_amount is required".into()]));
    }

    #[test]
    fn test_base_url_selection() {
        let gateway = MidtransGateway::new(MidtransConfig {
            server_key: "SB-key".into(),
            production: false,
            snap_base_url: None,
            api_base_url: Some("http://127.0.0.1:9/".into()),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(gateway.snap_base_url, SNAP_SANDBOX);
        assert_eq!(MidtransGateway::trimmed(&gateway.api_base_url), "http://127.0.0.1:9");
    }
}
