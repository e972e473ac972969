use crate::config::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub booking: BookingSettings,
    pub gateways: GatewaySettings,
    pub notifications: Notifications,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_max_size: u32,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub hold_minutes: i64,
    pub request_hold_hours: i64,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub timeout_seconds: u64,
    pub return_url: String,
    pub cancel_url: String,
    pub stripe: Option<StripeSecrets>,
    pub paypal: Option<PaypalSecrets>,
    pub sadad: Option<SadadSecrets>,
}

#[derive(Debug, Clone)]
pub struct StripeSecrets {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct PaypalSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SadadSecrets {
    pub merchant_id: String,
    pub secret_key: String,
    pub api_base: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub booking_webhook_url: Option<String>,
}
