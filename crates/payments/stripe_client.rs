use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
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
    },
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const PROVIDER: &str = "stripe";
/// Stripe's own default tolerance for replayed webhook deliveries.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Card payments through Stripe PaymentIntents.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub amount_received: Option<i64>,
    pub currency: Option<String>,
    pub client_secret: Option<String>,
    pub latest_charge: Option<String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl StripePaymentIntent {
    /// `requires_payment_method` means "not paid yet" until an attempt has actually failed.
    pub fn to_state(&self) -> GatewayPaymentState {
        let failure_reason = self.last_payment_error.as_ref().map(|err| {
            err.message
                .clone()
                .or_else(|| err.code.clone())
                .unwrap_or_else(|| "payment failed".to_string())
        });

        let status = match self.status.as_str() {
            "succeeded" => GatewayPaymentStatus::Succeeded,
            "canceled" => GatewayPaymentStatus::Failed,
            "requires_payment_method" if failure_reason.is_some() => GatewayPaymentStatus::Failed,
            _ => GatewayPaymentStatus::Pending,
        };

        GatewayPaymentState {
            status,
            amount_minor: self.amount_received.filter(|a| *a > 0).or(self.amount),
            currency: self.currency.as_ref().map(|c| c.to_ascii_uppercase()),
            gateway_transaction_id: Some(
                self.latest_charge.clone().unwrap_or_else(|| self.id.clone()),
            ),
            failure_reason: match status {
                GatewayPaymentStatus::Failed => {
                    failure_reason.or_else(|| Some(format!("payment intent {}", self.status)))
                }
                _ => None,
            },
        }
    }
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            secret_key,
            webhook_secret,
        })
    }

    /// Checks a `stripe-signature` header (`t=...,v1=...`) against the raw payload.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        now_unix: i64,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',').map(str::trim) {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
        if signatures.is_empty() {
            anyhow::bail!("missing v1 in stripe-signature");
        }
        let signed_at: i64 = timestamp.parse()?;
        if (now_unix - signed_at).abs() > SIGNATURE_TOLERANCE_SECS {
            anyhow::bail!("stripe-signature timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let valid = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });
        if !valid {
            anyhow::bail!("invalid webhook signature");
        }

        Ok(serde_json::from_slice(payload)?)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<StripePaymentIntent> {
        // https://stripe.com/docs/api/payment_intents/retrieve
        let url = format!("{STRIPE_API_BASE}/payment_intents/{intent_id}");
        let resp = send_with_single_retry(PROVIDER, "retrieve payment intent", || {
            self.http
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "retrieve payment intent").await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PaymentGatewayClient for StripeClient {
    fn gateway(&self) -> PaymentGateway {
        PaymentGateway::Stripe
    }

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder> {
        // https://stripe.com/docs/api/payment_intents/create
        let body = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("description", request.description.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[booking_id]", request.booking_id.to_string()),
            ("metadata[payment_id]", request.payment_id.to_string()),
        ];

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/payment_intents"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", format!("payment-{}", request.payment_id))
            .form(&body)
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "create payment intent").await?;
        let intent: StripePaymentIntent = resp.json().await?;

        Ok(GatewayOrder {
            gateway_ref: intent.id,
            client_secret: intent.client_secret,
            redirect_url: None,
        })
    }

    async fn capture_or_sync(&self, gateway_ref: String) -> Result<GatewayPaymentState> {
        // Intents are created with automatic capture, so reading the intent is enough.
        let intent = self.retrieve_intent(&gateway_ref).await?;
        Ok(intent.to_state())
    }

    async fn refund(
        &self,
        gateway_ref: String,
        amount_minor: i64,
        _currency: String,
        idempotency_key: String,
    ) -> Result<GatewayRefund> {
        // https://stripe.com/docs/api/refunds/create
        let body = [
            ("payment_intent", gateway_ref),
            ("amount", amount_minor.to_string()),
        ];

        let resp = send_with_single_retry(PROVIDER, "create refund", || {
            self.http
                .post(format!("{STRIPE_API_BASE}/refunds"))
                .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("Idempotency-Key", idempotency_key.clone())
                .form(&body)
        })
        .await?;
        let resp = ensure_success(resp, PROVIDER, "create refund").await?;

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
        let signature = headers
            .get("stripe-signature")
            .ok_or_else(|| anyhow!("missing stripe-signature header"))?;
        let event = self.verify_webhook_signature(&payload, signature, Utc::now().timestamp())?;

        if !event.type_.starts_with("payment_intent.") {
            return Ok(None);
        }
        Ok(event
            .data
            .object
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StripeClient {
        StripeClient::new(
            "sk_test".to_string(),
            "whsec_test".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn intent(status: &str, error: Option<&str>) -> StripePaymentIntent {
        StripePaymentIntent {
            id: "pi_123".to_string(),
            status: status.to_string(),
            amount: Some(389_60),
            amount_received: None,
            currency: Some("usd".to_string()),
            client_secret: None,
            latest_charge: Some("ch_456".to_string()),
            last_payment_error: error.map(|message| StripePaymentError {
                code: Some("card_declined".to_string()),
                message: Some(message.to_string()),
            }),
        }
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test", 1_700_000_000, payload));

        let event = client()
            .verify_webhook_signature(payload, &header, 1_700_000_060)
            .unwrap();
        assert_eq!(event.type_, "payment_intent.succeeded");
        assert_eq!(event.data.object["id"], "pi_123");
    }

    #[test]
    fn rejects_tampered_stale_or_foreign_signatures() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{}}}"#;
        let client = client();

        let foreign = format!("t=1700000000,v1={}", sign("other", 1_700_000_000, payload));
        assert!(client.verify_webhook_signature(payload, &foreign, 1_700_000_000).is_err());

        let good = format!("t=1700000000,v1={}", sign("whsec_test", 1_700_000_000, payload));
        assert!(client.verify_webhook_signature(b"{}", &good, 1_700_000_000).is_err());
        assert!(client.verify_webhook_signature(payload, &good, 1_700_001_000).is_err());
        assert!(client.verify_webhook_signature(payload, "v1=abcd", 1_700_000_000).is_err());
    }

    #[test]
    fn maps_intent_statuses() {
        let succeeded = intent("succeeded", None).to_state();
        assert_eq!(succeeded.status, GatewayPaymentStatus::Succeeded);
        assert_eq!(succeeded.amount_minor, Some(389_60));
        assert_eq!(succeeded.currency.as_deref(), Some("USD"));
        assert_eq!(succeeded.gateway_transaction_id.as_deref(), Some("ch_456"));

        let declined = intent("requires_payment_method", Some("Your card was declined.")).to_state();
        assert_eq!(declined.status, GatewayPaymentStatus::Failed);
        assert_eq!(declined.failure_reason.as_deref(), Some("Your card was declined."));

        assert_eq!(
            intent("requires_payment_method", None).to_state().status,
            GatewayPaymentStatus::Pending
        );
        assert_eq!(intent("processing", None).to_state().status, GatewayPaymentStatus::Pending);
        assert_eq!(intent("canceled", None).to_state().status, GatewayPaymentStatus::Failed);
    }
}
