use backend::config::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub worker_server: WorkerServer,
    pub database: Database,
    pub maintenance: Maintenance,
    pub notifications: Notifications,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_max_size: u32,
}

/// Internal endpoints called by the external scheduler.
#[derive(Debug, Clone)]
pub struct Maintenance {
    pub internal_token: Option<String>,
    pub default_limit: i64,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub booking_webhook_url: Option<String>,
}
