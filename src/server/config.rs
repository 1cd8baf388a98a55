use super::RequestsLoggingLevel;
use crate::push::PushConfig;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Bearer token required on the generation routes. `None` leaves them open.
    pub cron_secret: Option<String>,
    /// Handed to clients so they can register the background handler.
    pub push: PushConfig,
    pub relay_public_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3010,
            cron_secret: None,
            push: PushConfig::default(),
            relay_public_key: None,
        }
    }
}
