//! Pure health monitoring and reconnection logic for the MQTT client
//!
//! This module contains pure functions for reconnection decisions and
//! connection state transitions. The event loop supervisor in
//! [`super::client`] feeds it events and applies the results.

use super::connection::{ConnectionState, ReconnectPolicy};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted (pure function)
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        policy: &ReconnectPolicy,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }
        if !policy.enabled {
            return ReconnectionDecision::AbortDisabled;
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay: policy.calculate_backoff_delay(attempt),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::DisconnectedByBroker => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::DisconnectedByClient => {
                ConnectionState::Disconnected("Client disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
        }
    }

    /// Check if connection state allows publishing (pure function)
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Check if connection state allows subscribing (pure function)
    pub fn can_subscribe(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Calculate health metrics for connection (pure function)
    pub fn calculate_health_metrics(
        state: &ConnectionState,
        connect_time: Option<Instant>,
        reconnect_count: u32,
    ) -> HealthMetrics {
        let is_healthy = matches!(state, ConnectionState::Connected);
        HealthMetrics {
            uptime: connect_time
                .filter(|_| is_healthy)
                .map(|t| Instant::now().duration_since(t)),
            reconnect_count,
            is_healthy,
        }
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("MQTT connection established");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection lost: {}", reason);
            }
            (ConnectionState::Connecting, ConnectionState::Disconnected(reason)) => {
                error!("MQTT connection failed: {}", reason);
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!("Starting reconnection attempt {}", attempt);
            }
            (ConnectionState::Reconnecting(_), ConnectionState::Connected) => {
                info!("Reconnection successful");
            }
            _ => {
                tracing::debug!(target: "mqtt_transport", "MQTT connection state: {} -> {}", from, to);
            }
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay: Duration },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - automatic reconnect is off
    AbortDisabled,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// ConnAck received from broker
    ConnAckReceived,
    /// Broker initiated disconnect
    DisconnectedByBroker,
    /// Local disconnect completed
    DisconnectedByClient,
    /// Network or protocol error
    NetworkError(String),
    /// Reconnection attempt started
    ReconnectionStarted(u32),
}

/// Health metrics for connection monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct HealthMetrics {
    /// Time since the current connection was established
    pub uptime: Option<Duration>,
    /// Number of successful reconnections
    pub reconnect_count: u32,
    /// Overall health status
    pub is_healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_should_attempt_reconnection() {
        let policy = enabled_policy();

        let decision = HealthMonitor::should_attempt_reconnection(0, &policy, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );

        let decision = HealthMonitor::should_attempt_reconnection(3, &policy, false);
        assert_eq!(
            decision,
            ReconnectionDecision::Proceed {
                attempt: 4,
                delay: Duration::from_secs(8)
            }
        );

        // Shutdown wins over everything
        let decision = HealthMonitor::should_attempt_reconnection(0, &policy, true);
        assert_eq!(decision, ReconnectionDecision::AbortShutdownRequested);
    }

    #[test]
    fn test_reconnection_disabled() {
        let decision =
            HealthMonitor::should_attempt_reconnection(0, &ReconnectPolicy::default(), false);
        assert_eq!(decision, ReconnectionDecision::AbortDisabled);
    }

    #[test]
    fn test_determine_next_state() {
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::ConnAckReceived),
            ConnectionState::Connected
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::DisconnectedByBroker),
            ConnectionState::Disconnected("Broker disconnected".to_string())
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::NetworkError(
                "timeout".to_string()
            )),
            ConnectionState::Disconnected("timeout".to_string())
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionEvent::ReconnectionStarted(2)),
            ConnectionState::Reconnecting(2)
        );
    }

    #[test]
    fn test_can_publish_and_subscribe() {
        assert!(HealthMonitor::can_publish(&ConnectionState::Connected));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Connecting));
        assert!(!HealthMonitor::can_publish(&ConnectionState::Reconnecting(1)));
        assert!(HealthMonitor::can_subscribe(&ConnectionState::Connected));
        assert!(!HealthMonitor::can_subscribe(&ConnectionState::Disconnected(
            "test".to_string()
        )));
    }

    #[test]
    fn test_calculate_health_metrics() {
        let connect_time = Some(Instant::now() - Duration::from_secs(60));

        let metrics =
            HealthMonitor::calculate_health_metrics(&ConnectionState::Connected, connect_time, 2);
        assert!(metrics.is_healthy);
        assert!(metrics.uptime.unwrap() >= Duration::from_secs(60));
        assert_eq!(metrics.reconnect_count, 2);

        let metrics = HealthMonitor::calculate_health_metrics(
            &ConnectionState::Reconnecting(1),
            connect_time,
            2,
        );
        assert!(!metrics.is_healthy);
        assert!(metrics.uptime.is_none());
    }
}
