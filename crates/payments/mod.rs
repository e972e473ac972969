pub mod gateways;
pub mod http;
pub mod paypal_client;
pub mod sadad_client;
pub mod stripe_client;
