use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_gateways::PaymentGateway;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: Uuid,
    pub gateway: PaymentGateway,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub gateway: PaymentGateway,
    pub order_ref: String,
}

#[derive(Debug, Serialize)]
pub struct OrderRefDto {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub gateway: PaymentGateway,
    pub order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Stripe PaymentIntent client secret for the front-end SDK.
    pub client_secret: Option<String>,
    /// Hosted page the guest is redirected to (PayPal approval, Sadad checkout).
    pub redirect_url: Option<String>,
}

/// What a gateway needs to open an order for one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrderRequest {
    /// Our payment attempt id; doubles as the gateway idempotency key.
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub gateway_ref: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Succeeded,
    Failed,
    Pending,
}

/// Authoritative state fetched from the gateway, never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaymentState {
    pub status: GatewayPaymentStatus,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRefund {
    pub refund_id: String,
}

/// Lower-cased header name to value, as received on a webhook request.
pub type WebhookHeaders = HashMap<String, String>;
