use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    repositories::payment_gateways::PaymentGatewayClient,
    value_objects::enums::payment_gateways::PaymentGateway,
};

pub type SharedGatewayClient = Arc<dyn PaymentGatewayClient + Send + Sync>;

/// The gateway clients this deployment has credentials for.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    clients: HashMap<PaymentGateway, SharedGatewayClient>,
}

impl PaymentGateways {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, client: SharedGatewayClient) -> Self {
        self.clients.insert(client.gateway(), client);
        self
    }

    pub fn get(&self, gateway: PaymentGateway) -> Option<SharedGatewayClient> {
        self.clients.get(&gateway).cloned()
    }

    pub fn configured(&self) -> Vec<PaymentGateway> {
        let mut gateways: Vec<PaymentGateway> = self.clients.keys().copied().collect();
        gateways.sort_by_key(|g| g.as_str());
        gateways
    }
}
