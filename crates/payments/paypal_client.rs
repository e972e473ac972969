use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

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

const PROVIDER: &str = "paypal";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PaypalSettings {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_id: String,
    /// `https://api-m.sandbox.paypal.com` or `https://api-m.paypal.com`.
    pub api_base: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// PayPal Orders v2 with explicit capture.
pub struct PaypalClient {
    http: reqwest::Client,
    settings: PaypalSettings,
    token: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<PaypalLink>,
    #[serde(default)]
    pub purchase_units: Vec<PaypalPurchaseUnit>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalLink {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub struct PaypalPurchaseUnit {
    pub payments: Option<PaypalPayments>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalPayments {
    #[serde(default)]
    pub captures: Vec<PaypalCapture>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalCapture {
    pub id: String,
    pub status: String,
    pub amount: Option<PaypalAmount>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalAmount {
    pub currency_code: String,
    pub value: String,
}

impl PaypalOrder {
    fn capture(&self) -> Option<&PaypalCapture> {
        self.purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .next()
    }

    fn approval_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.clone())
    }

    pub fn to_state(&self) -> GatewayPaymentState {
        let capture = self.capture();
        let status = match (self.status.as_str(), capture.map(|c| c.status.as_str())) {
            (_, Some("COMPLETED")) => GatewayPaymentStatus::Succeeded,
            (_, Some("DECLINED" | "FAILED")) => GatewayPaymentStatus::Failed,
            ("VOIDED", _) => GatewayPaymentStatus::Failed,
            _ => GatewayPaymentStatus::Pending,
        };
        let amount = capture.and_then(|c| c.amount.as_ref());

        GatewayPaymentState {
            status,
            amount_minor: amount.and_then(|a| parse_minor(&a.value)),
            currency: amount.map(|a| a.currency_code.clone()),
            gateway_transaction_id: capture.map(|c| c.id.clone()),
            failure_reason: match status {
                GatewayPaymentStatus::Failed => Some(format!(
                    "paypal order {} ({})",
                    self.status,
                    capture.map(|c| c.status.as_str()).unwrap_or("no capture")
                )),
                _ => None,
            },
        }
    }
}

/// Order id a webhook event refers to. Order events carry it as the resource id, capture
/// events under `supplementary_data.related_ids`.
pub fn order_ref_from_event(event: &Value) -> Option<String> {
    let event_type = event.get("event_type")?.as_str()?;
    let resource = event.get("resource")?;

    let order_id = if event_type.starts_with("CHECKOUT.ORDER.") {
        resource.get("id")
    } else if event_type.starts_with("PAYMENT.CAPTURE.") {
        resource.pointer("/supplementary_data/related_ids/order_id")
    } else {
        None
    };
    order_id.and_then(Value::as_str).map(str::to_string)
}

impl PaypalClient {
    pub fn new(settings: PaypalSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            settings,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        // https://developer.paypal.com/api/rest/authentication/
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.settings.client_id, self.settings.client_secret
        ));
        let url = self.url("/v1/oauth2/token");
        let resp = send_with_single_retry(PROVIDER, "fetch access token", || {
            self.http
                .post(&url)
                .header(AUTHORIZATION, format!("Basic {basic}"))
                .form(&[("grant_type", "client_credentials")])
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "fetch access token").await?;

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: String,
            expires_in: u64,
        }

        let parsed: TokenResp = resp.json().await?;
        let expires_at = Instant::now() + Duration::from_secs(parsed.expires_in);
        *cached = Some((parsed.access_token.clone(), expires_at));
        Ok(parsed.access_token)
    }

    async fn get_order(&self, order_id: &str) -> Result<PaypalOrder> {
        let token = self.access_token().await?;
        let url = self.url(&format!("/v2/checkout/orders/{order_id}"));
        let resp = send_with_single_retry(PROVIDER, "show order", || {
            self.http.get(&url).bearer_auth(&token)
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "show order").await?;
        Ok(resp.json().await?)
    }

    async fn capture_order(&self, order_id: &str) -> Result<PaypalOrder> {
        // https://developer.paypal.com/docs/api/orders/v2/#orders_capture
        let token = self.access_token().await?;
        let url = self.url(&format!("/v2/checkout/orders/{order_id}/capture"));
        let request_id = format!("capture-{order_id}");
        let resp = send_with_single_retry(PROVIDER, "capture order", || {
            self.http
                .post(&url)
                .bearer_auth(&token)
                .header(CONTENT_TYPE, "application/json")
                .header("PayPal-Request-Id", request_id.clone())
                .body("{}")
        })
        .await?;

        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            // ORDER_ALREADY_CAPTURED and friends: the order itself is the source of truth.
            info!(%order_id, "payments: paypal capture not applicable, re-reading order");
            return self.get_order(order_id).await;
        }
        let resp = ensure_success(resp, PROVIDER, "capture order").await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PaymentGatewayClient for PaypalClient {
    fn gateway(&self) -> PaymentGateway {
        PaymentGateway::Paypal
    }

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder> {
        // https://developer.paypal.com/docs/api/orders/v2/#orders_create
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.booking_id.to_string(),
                "custom_id": request.payment_id.to_string(),
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_minor(request.amount_minor),
                },
            }],
            "application_context": {
                "return_url": self.settings.return_url,
                "cancel_url": self.settings.cancel_url,
                "user_action": "PAY_NOW",
            },
        });

        let resp = self
            .http
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("order-{}", request.payment_id))
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "create order").await?;
        let order: PaypalOrder = resp.json().await?;

        Ok(GatewayOrder {
            redirect_url: order.approval_url(),
            gateway_ref: order.id,
            client_secret: None,
        })
    }

    async fn capture_or_sync(&self, gateway_ref: String) -> Result<GatewayPaymentState> {
        let order = self.get_order(&gateway_ref).await?;
        let order = match order.status.as_str() {
            "APPROVED" => self.capture_order(&gateway_ref).await?,
            _ => order,
        };
        Ok(order.to_state())
    }

    async fn refund(
        &self,
        gateway_ref: String,
        amount_minor: i64,
        currency: String,
        idempotency_key: String,
    ) -> Result<GatewayRefund> {
        let order = self.get_order(&gateway_ref).await?;
        let capture_id = order
            .capture()
            .map(|c| c.id.clone())
            .ok_or_else(|| anyhow!("paypal order {gateway_ref} has no capture to refund"))?;

        // https://developer.paypal.com/docs/api/payments/v2/#captures_refund
        let token = self.access_token().await?;
        let url = self.url(&format!("/v2/payments/captures/{capture_id}/refund"));
        let body = json!({
            "amount": { "value": format_minor(amount_minor), "currency_code": currency },
        });
        let resp = send_with_single_retry(PROVIDER, "refund capture", || {
            self.http
                .post(&url)
                .bearer_auth(&token)
                .header("PayPal-Request-Id", idempotency_key.clone())
                .json(&body)
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "refund capture").await?;

        #[derive(Deserialize)]
        struct RefundResp {
            id: String,
        }

        let parsed: RefundResp = resp.json().await?;
        Ok(GatewayRefund {
            refund_id: parsed.id,
        })
    }

    async fn verify_webhook(
        &self,
        headers: WebhookHeaders,
        payload: Vec<u8>,
    ) -> Result<Option<String>> {
        let header = |name: &str| {
            headers
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("missing {name} header"))
        };
        let event: Value = serde_json::from_slice(&payload)?;

        // https://developer.paypal.com/docs/api/webhooks/v1/#verify-webhook-signature_post
        let body = json!({
            "auth_algo": header("paypal-auth-algo")?,
            "cert_url": header("paypal-cert-url")?,
            "transmission_id": header("paypal-transmission-id")?,
            "transmission_sig": header("paypal-transmission-sig")?,
            "transmission_time": header("paypal-transmission-time")?,
            "webhook_id": self.settings.webhook_id,
            "webhook_event": event,
        });

        let token = self.access_token().await?;
        let url = self.url("/v1/notifications/verify-webhook-signature");
        let resp = send_with_single_retry(PROVIDER, "verify webhook signature", || {
            self.http.post(&url).bearer_auth(&token).json(&body)
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "verify webhook signature").await?;

        #[derive(Deserialize)]
        struct VerifyResp {
            verification_status: String,
        }

        let parsed: VerifyResp = resp.json().await?;
        if parsed.verification_status != "SUCCESS" {
            anyhow::bail!(
                "paypal webhook verification returned {}",
                parsed.verification_status
            );
        }

        Ok(order_ref_from_event(&event))
    }
}
