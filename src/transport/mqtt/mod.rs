//! rumqttc-backed MQTT transport
//!
//! Pure functions are kept apart from I/O so most of the logic is testable
//! without a broker:
//!
//! - [`connection`] - connection state, reconnect policy, rumqttc option mapping
//! - [`message_handler`] - routing of rumqttc events
//! - [`health_monitor`] - reconnection decisions and health metrics
//! - [`ack_tracker`] - correlation of requests with broker acknowledgments
//! - [`registry`] - subscribed filters and their delivery callbacks
//! - [`client`] - the event loop supervisor and [`RumqttTransport`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_bind::config::ClientConfig;
//! use mqtt_bind::transport::mqtt::{configure_mqtt_options, ReconnectPolicy, RumqttTransport, SessionSettings};
//! use mqtt_bind::transport::MqttTransport;
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::new("tcp://localhost:1883", "sensor-gateway");
//! let options = configure_mqtt_options(&config, None)?;
//! let transport = RumqttTransport::connect(
//!     options,
//!     SessionSettings {
//!         client_id: config.client_id.clone(),
//!         connection_timeout: config.connection_timeout(),
//!         reconnect: ReconnectPolicy::from_config(&config),
//!         manual_acks: config.manual_acks,
//!     },
//! )
//! .await?;
//! transport.disconnect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod ack_tracker;
pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;
pub mod registry;

pub use ack_tracker::{AckTracker, RequestKind};
pub use client::{RumqttTransport, SessionSettings};
pub use connection::{configure_mqtt_options, ConnectionState, ReconnectPolicy, WireOptions};
pub use health_monitor::{
    ConnectionEvent, HealthMetrics, HealthMonitor, ReconnectionDecision,
};
pub use message_handler::{EventRoute, MessageHandler};
pub use registry::SubscriptionRegistry;
