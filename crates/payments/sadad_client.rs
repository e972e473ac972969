use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::http::{build_client, ensure_success, send_with_single_retry};
use crate::domain::{
    repositories::payment_gateways::PaymentGatewayClient,
    value_objects::{
        enums::payment_gateways::PaymentGateway,
        payments::{
            GatewayOrder, GatewayOrderRequest, GatewayPaymentState, GatewayPaymentStatus,
            GatewayRefund, WebhookHeaders,
        },
        pricing::{format_minor, parse_minor},
    },
};

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "sadad";
pub const SIGNATURE_HEADER: &str = "x-sadad-signature";
const MERCHANT_HEADER: &str = "x-sadad-merchant";

#[derive(Debug, Clone)]
pub struct SadadSettings {
    pub merchant_id: String,
    pub secret_key: String,
    pub api_base: String,
    pub callback_url: String,
}

/// Sadad hosted checkout. Every request and webhook body is signed with HMAC-SHA256 over the
/// raw bytes using the merchant secret; GET requests sign their path.
pub struct SadadClient {
    http: reqwest::Client,
    settings: SadadSettings,
}

#[derive(Debug, Serialize)]
struct SadadOrderBody<'a> {
    merchant_id: &'a str,
    merchant_order_id: String,
    amount: String,
    currency: &'a str,
    description: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SadadOrderCreated {
    order_id: String,
    payment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SadadOrderStatus {
    pub order_id: String,
    pub status: String,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
}

impl SadadOrderStatus {
    pub fn to_state(&self) -> GatewayPaymentState {
        let status = match self.status.to_ascii_uppercase().as_str() {
            "SUCCESS" | "PAID" | "CAPTURED" => GatewayPaymentStatus::Succeeded,
            "FAILED" | "DECLINED" | "CANCELLED" | "EXPIRED" => GatewayPaymentStatus::Failed,
            _ => GatewayPaymentStatus::Pending,
        };

        GatewayPaymentState {
            status,
            amount_minor: self.amount.as_deref().and_then(parse_minor),
            currency: self.currency.clone(),
            gateway_transaction_id: Some(
                self.transaction_id
                    .clone()
                    .unwrap_or_else(|| self.order_id.clone()),
            ),
            failure_reason: match status {
                GatewayPaymentStatus::Failed => Some(
                    self.message
                        .clone()
                        .unwrap_or_else(|| format!("sadad order {}", self.status)),
                ),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SadadWebhook {
    order_id: Option<String>,
}

fn sign(secret: &str, message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> Result<()> {
    let provided = hex::decode(signature_hex.trim())?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    mac.verify_slice(&provided)
        .map_err(|_| anyhow!("invalid sadad signature"))
}

impl SadadClient {
    pub fn new(settings: SadadSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    async fn post_signed(&self, path: &str, body: Vec<u8>, context: &str) -> Result<reqwest::Response> {
        let signature = sign(&self.settings.secret_key, &body)?;
        let resp = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .header(MERCHANT_HEADER, &self.settings.merchant_id)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;
        ensure_success(resp, PROVIDER, context).await
    }

    async fn order_status(&self, order_id: &str) -> Result<SadadOrderStatus> {
        let path = format!("/v1/orders/{order_id}");
        let signature = sign(&self.settings.secret_key, path.as_bytes())?;
        let url = self.url(&path);
        let resp = send_with_single_retry(PROVIDER, "order status", || {
            self.http
                .get(&url)
                .header(MERCHANT_HEADER, &self.settings.merchant_id)
                .header(SIGNATURE_HEADER, &signature)
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "order status").await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PaymentGatewayClient for SadadClient {
    fn gateway(&self) -> PaymentGateway {
        PaymentGateway::Sadad
    }

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder> {
        // The merchant order id is our payment id, which Sadad rejects when reused.
        let body = serde_json::to_vec(&SadadOrderBody {
            merchant_id: &self.settings.merchant_id,
            merchant_order_id: request.payment_id.to_string(),
            amount: format_minor(request.amount_minor),
            currency: &request.currency,
            description: &request.description,
            callback_url: &self.settings.callback_url,
        })?;

        let resp = self.post_signed("/v1/orders", body, "create order").await?;
        let created: SadadOrderCreated = resp.json().await?;

        Ok(GatewayOrder {
            gateway_ref: created.order_id,
            client_secret: None,
            redirect_url: created.payment_url,
        })
    }

    async fn capture_or_sync(&self, gateway_ref: String) -> Result<GatewayPaymentState> {
        // Sadad captures on the hosted page; only the status read is needed.
        let status = self.order_status(&gateway_ref).await?;
        Ok(status.to_state())
    }

    async fn refund(
        &self,
        gateway_ref: String,
        amount_minor: i64,
        currency: String,
        idempotency_key: String,
    ) -> Result<GatewayRefund> {
        let body = serde_json::to_vec(&serde_json::json!({
            "merchant_id": self.settings.merchant_id,
            "amount": format_minor(amount_minor),
            "currency": currency,
            "refund_reference": idempotency_key,
        }))?;

        let resp = self
            .post_signed(&format!("/v1/orders/{gateway_ref}/refunds"), body, "refund order")
            .await?;

        #[derive(Deserialize)]
        struct RefundResp {
            refund_id: String,
        }

        let parsed: RefundResp = resp.json().await?;
        Ok(GatewayRefund {
            refund_id: parsed.refund_id,
        })
    }

    async fn verify_webhook(
        &self,
        headers: WebhookHeaders,
        payload: Vec<u8>,
    ) -> Result<Option<String>> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or_else(|| anyhow!("missing {SIGNATURE_HEADER} header"))?;
        verify_signature(&self.settings.secret_key, &payload, signature)?;

        let event: SadadWebhook = serde_json::from_slice(&payload)?;
        Ok(event.order_id)
    }
}
