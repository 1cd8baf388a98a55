use axum::extract::FromRef;
use std::time::Instant;

use crate::generation::GenerationTrigger;

use super::ServerConfig;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub trigger: GenerationTrigger,
}

impl ServerState {
    pub fn new(config: ServerConfig, trigger: GenerationTrigger) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            trigger,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GenerationTrigger {
    fn from_ref(input: &ServerState) -> Self {
        input.trigger.clone()
    }
}
