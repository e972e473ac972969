use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::{
    enums::payment_gateways::PaymentGateway,
    payments::{
        GatewayOrder, GatewayOrderRequest, GatewayPaymentState, GatewayRefund, WebhookHeaders,
    },
};

/// The three operations every payment provider offers.
#[automock]
#[async_trait]
pub trait PaymentGatewayClient {
    fn gateway(&self) -> PaymentGateway;

    /// Opens a gateway-side order or intent. Never retried without the idempotency key.
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder>;

    /// Captures (where the provider needs an explicit capture) or re-reads the authoritative
    /// status of an order.
    async fn capture_or_sync(&self, gateway_ref: String) -> Result<GatewayPaymentState>;

    async fn refund(
        &self,
        gateway_ref: String,
        amount_minor: i64,
        currency: String,
        idempotency_key: String,
    ) -> Result<GatewayRefund>;

    /// Authenticates a webhook delivery and returns the order it is about, if any. `Err`
    /// means the delivery is not genuine.
    async fn verify_webhook(&self, headers: WebhookHeaders, payload: Vec<u8>)
    -> Result<Option<String>>;
}
