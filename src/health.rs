//! Health check system for production monitoring
//!
//! Reports whether the MQTT client is connected, together with its client
//! identifier and connection statistics.

use crate::transport::MqttTransport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub component: String,
    pub healthy: bool,
    pub message: Option<String>,
    pub details: Map<String, Value>,
    pub response_time_ms: Option<u64>,
}

/// Trait for components that can be health checked
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Perform health check on this component
    async fn health_check(&self) -> HealthCheckResult;

    /// Get the component name for reporting
    fn component_name(&self) -> &str;
}

/// MQTT client health check; healthy iff connected
pub struct MqttHealthCheck {
    client: Arc<dyn MqttTransport>,
}

impl MqttHealthCheck {
    pub const COMPONENT: &'static str = "mqtt-client";

    pub fn new(client: Arc<dyn MqttTransport>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for MqttHealthCheck {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let component = self.component_name().to_string();

        let connection_state = self.client.connection_state();
        let healthy = self.client.is_connected();

        let mut details = Map::new();
        details.insert("clientId".to_string(), json!(self.client.client_identifier()));
        details.insert(
            "protocolVersion".to_string(),
            json!(self.client.protocol_version().to_string()),
        );
        details.insert("state".to_string(), json!(connection_state.to_string()));
        if let Some(metrics) = self.client.health_metrics() {
            details.insert("reconnectCount".to_string(), json!(metrics.reconnect_count));
            if let Some(uptime) = metrics.uptime {
                details.insert("uptimeSecs".to_string(), json!(uptime.as_secs()));
            }
        }

        let message = if healthy {
            "MQTT connection healthy".to_string()
        } else {
            format!("MQTT not connected - state: {connection_state}")
        };
        let response_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "MQTT health check: healthy={}, connection_state={}, response_time={}ms",
            healthy, connection_state, response_time_ms
        );

        HealthCheckResult {
            component,
            healthy,
            message: Some(message),
            details,
            response_time_ms: Some(response_time_ms),
        }
    }

    fn component_name(&self) -> &str {
        Self::COMPONENT
    }
}

/// Aggregated health check manager
pub struct HealthCheckManager {
    health_checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthCheckManager {
    pub fn new() -> Self {
        Self {
            health_checks: Vec::new(),
        }
    }

    /// Add a health check to the manager
    pub fn add_health_check(&mut self, health_check: Box<dyn HealthCheck>) {
        self.health_checks.push(health_check);
    }

    /// Run all health checks and return aggregated results
    pub async fn run_health_checks(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::new();

        for health_check in &self.health_checks {
            let result = health_check.health_check().await;
            results.push(result);
        }

        results
    }

    /// Calculate overall health status from all components
    pub async fn calculate_overall_health(&self) -> bool {
        let results = self.run_health_checks().await;

        if results.is_empty() {
            warn!("No health checks configured - assuming healthy");
            return true;
        }

        let healthy_count = results.iter().filter(|r| r.healthy).count();
        let total_count = results.len();

        // All components must be healthy for overall health
        let overall_healthy = healthy_count == total_count;

        debug!(
            "Overall health check: {}/{} components healthy, overall={}",
            healthy_count, total_count, overall_healthy
        );

        overall_healthy
    }
}

impl Default for HealthCheckManager {
    fn default() -> Self {
        Self::new()
    }
}
