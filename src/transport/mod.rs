//! Transport abstraction over the MQTT wire client
//!
//! The binding layer (contexts, subscription manager, publish dispatcher) only
//! talks to [`MqttTransport`]. The production implementation wraps rumqttc in
//! [`mqtt::RumqttTransport`]; tests use `testing::MockTransport`.

use crate::config::ProtocolVersion;
use crate::error::MqttResult;
use crate::message::MqttProperties;
use bytes::Bytes;
use std::sync::Arc;

pub mod mqtt;
pub mod topics;

pub use mqtt::ConnectionState;

/// Callback invoked for every inbound publish matching a registered filter
pub type DeliveryCallback = Arc<dyn Fn(InboundPublish) + Send + Sync>;

/// Publish request handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPublish {
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub retain: bool,
    /// Forwarded on MQTT 5 only
    pub properties: Option<MqttProperties>,
}

/// Publish delivered by the broker
#[derive(Debug, Clone)]
pub struct InboundPublish {
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub retain: bool,
    pub dup: bool,
    pub pkid: u16,
    pub properties: Option<MqttProperties>,
    pub handle: PublishHandle,
}

/// Opaque record of a delivered publish, needed to acknowledge it
#[derive(Debug, Clone)]
pub struct PublishHandle {
    pkid: u16,
    qos: u8,
    wire: WirePublish,
}

#[derive(Debug, Clone)]
pub(crate) enum WirePublish {
    V3(rumqttc::Publish),
    V5(rumqttc::v5::mqttbytes::v5::Publish),
    Detached,
}

impl PublishHandle {
    pub(crate) fn v3(publish: rumqttc::Publish) -> Self {
        Self {
            pkid: publish.pkid,
            qos: publish.qos as u8,
            wire: WirePublish::V3(publish),
        }
    }

    pub(crate) fn v5(publish: rumqttc::v5::mqttbytes::v5::Publish) -> Self {
        Self {
            pkid: publish.pkid,
            qos: publish.qos as u8,
            wire: WirePublish::V5(publish),
        }
    }

    /// Handle with no wire record behind it, for transports that track
    /// acknowledgments themselves
    pub fn detached(pkid: u16, qos: u8) -> Self {
        Self {
            pkid,
            qos,
            wire: WirePublish::Detached,
        }
    }

    pub fn pkid(&self) -> u16 {
        self.pkid
    }

    pub fn qos(&self) -> u8 {
        self.qos
    }

    /// QoS 0 deliveries carry nothing to acknowledge
    pub fn requires_ack(&self) -> bool {
        self.qos > 0
    }

    pub(crate) fn wire(&self) -> &WirePublish {
        &self.wire
    }
}

/// Connected MQTT client as seen by the binding layer
///
/// Implementations serialize wire writes internally; every method may be
/// called concurrently from multiple tasks.
#[async_trait::async_trait]
pub trait MqttTransport: Send + Sync {
    fn protocol_version(&self) -> ProtocolVersion;

    fn client_identifier(&self) -> &str;

    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), ConnectionState::Connected)
    }

    /// Uptime and reconnect statistics, if the transport tracks them
    fn health_metrics(&self) -> Option<mqtt::HealthMetrics> {
        None
    }

    /// Resolves once the broker has acknowledged the publish at its QoS
    async fn publish(&self, request: OutboundPublish) -> MqttResult<()>;

    /// Subscribe to every filter with one SUBSCRIBE packet and route matching
    /// deliveries to `callback` until unsubscribed
    async fn subscribe(
        &self,
        filters: Vec<(String, u8)>,
        callback: DeliveryCallback,
    ) -> MqttResult<()>;

    async fn unsubscribe(&self, filters: Vec<String>) -> MqttResult<()>;

    /// Send PUBACK/PUBREC for a manually acknowledged delivery
    fn acknowledge(&self, handle: &PublishHandle) -> MqttResult<()>;

    async fn disconnect(&self) -> MqttResult<()>;
}
