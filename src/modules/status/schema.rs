use serde::Serialize;

use crate::services::classifier::ProducerHealth;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub web_service: &'static str,
    pub monitor_service: &'static str,
    #[serde(flatten)]
    pub producer: ProducerHealth,
}

impl HealthResponse {
    pub fn new(producer: ProducerHealth) -> Self {
        Self {
            web_service: "healthy",
            monitor_service: if producer.monitor_healthy { "healthy" } else { "stale" },
            producer,
        }
    }
}
