//! Binding contexts: one message plus its topic, as handed to consumers
//!
//! A context wraps an [`MqttMessage`], the topic it was delivered on (or is
//! about to be published to) and a weak reference to the client, which it
//! needs only to acknowledge manually acknowledged deliveries. The
//! [`BindingContext`] contract is shared by both protocol variants;
//! [`MqttV5BindingContext`] adds access to MQTT 5 properties.

use crate::config::ProtocolVersion;
use crate::error::MqttResult;
use crate::message::MqttMessage;
use crate::transport::{InboundPublish, MqttTransport, PublishHandle};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use tracing::warn;

/// Accessors and acknowledgment shared by both protocol variants
pub trait BindingContext: Send {
    fn protocol_version(&self) -> ProtocolVersion;

    fn payload(&self) -> &Bytes;

    fn set_payload(&mut self, payload: Bytes) -> MqttResult<()>;

    fn qos(&self) -> u8;

    /// Fails with `InvalidQos` outside 0..=2
    fn set_qos(&mut self, qos: i32) -> MqttResult<()>;

    fn is_retained(&self) -> bool;

    fn set_retained(&mut self, retained: bool) -> MqttResult<()>;

    /// Always set for delivered messages; unset for outbound contexts until
    /// the caller provides one
    fn topic(&self) -> Option<&str>;

    fn set_topic(&mut self, topic: String);

    /// Wire-assigned identifier, 0 for QoS 0
    fn message_id(&self) -> u16;

    /// Acknowledge a manually acknowledged delivery
    ///
    /// No-op unless manual acknowledgment is on and the context came from the
    /// wire. Only the first call reaches the transport. Transport failures are
    /// logged, never returned.
    fn acknowledge(&self);

    fn is_acknowledged(&self) -> bool;

    /// The wrapped envelope, for protocol-specific fields
    fn native_message(&self) -> &MqttMessage;
}

/// Context variants the subscription manager can build from deliveries
pub trait FromInbound: BindingContext + Sized + 'static {
    const PROTOCOL: ProtocolVersion;

    fn from_inbound(
        inbound: InboundPublish,
        client: Weak<dyn MqttTransport>,
        manual_acks: bool,
    ) -> Self;

    /// Empty, mutable context for an outbound message
    fn for_publish(client: Weak<dyn MqttTransport>) -> Self;
}

/// State common to both variants
#[derive(Debug)]
pub(crate) struct ContextCore {
    message: MqttMessage,
    topic: Option<String>,
    client: Weak<dyn MqttTransport>,
    manual_acks: bool,
    handle: Option<PublishHandle>,
    acknowledged: AtomicBool,
}

impl ContextCore {
    pub(crate) fn outbound(client: Weak<dyn MqttTransport>) -> Self {
        Self {
            message: MqttMessage::new(),
            topic: None,
            client,
            manual_acks: false,
            handle: None,
            acknowledged: AtomicBool::new(false),
        }
    }

    /// Inbound envelopes are frozen once built
    pub(crate) fn inbound(
        inbound: InboundPublish,
        keep_properties: bool,
        client: Weak<dyn MqttTransport>,
        manual_acks: bool,
    ) -> Self {
        let mut message = MqttMessage::with_payload(inbound.payload);
        let populated = message
            .set_qos(i32::from(inbound.qos))
            .and_then(|()| message.set_retained(inbound.retain))
            .and_then(|()| message.set_dup(inbound.dup))
            .and_then(|()| message.set_message_id(inbound.pkid))
            .and_then(|()| {
                message.set_properties(inbound.properties.filter(|_| keep_properties))
            });
        if let Err(e) = populated {
            // Only reachable with a QoS the wire decoder would have rejected
            warn!(topic = %inbound.topic, "Inbound message field rejected: {}", e);
        }
        message.set_mutable(false);

        Self {
            message,
            topic: Some(inbound.topic),
            client,
            manual_acks,
            handle: Some(inbound.handle),
            acknowledged: AtomicBool::new(false),
        }
    }

    pub(crate) fn message(&self) -> &MqttMessage {
        &self.message
    }

    pub(crate) fn message_mut(&mut self) -> &mut MqttMessage {
        &mut self.message
    }

    pub(crate) fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub(crate) fn set_topic(&mut self, topic: String) {
        self.topic = Some(topic);
    }

    pub(crate) fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire)
    }

    pub(crate) fn acknowledge(&self) {
        if !self.manual_acks {
            return;
        }
        let Some(handle) = self.handle.as_ref().filter(|h| h.requires_ack()) else {
            return;
        };
        if self.acknowledged.swap(true, Ordering::AcqRel) {
            return;
        }

        let topic = self.topic.as_deref().unwrap_or_default();
        match self.client.upgrade() {
            Some(client) => {
                if let Err(e) = client.acknowledge(handle) {
                    warn!(topic, pkid = handle.pkid(), "Failed to acknowledge message: {}", e);
                } else {
                    tracing::debug!(target: "mqtt_transport", topic, pkid = handle.pkid(), "Message acknowledged");
                }
            }
            None => warn!(topic, "Client is gone, message cannot be acknowledged"),
        }
    }
}

/// Implements the shared accessors by delegating to a `core` field
macro_rules! delegate_binding_context {
    ($context:ty, $protocol:expr) => {
        impl $crate::bind::BindingContext for $context {
            fn protocol_version(&self) -> $crate::config::ProtocolVersion {
                $protocol
            }

            fn payload(&self) -> &bytes::Bytes {
                self.core.message().payload()
            }

            fn set_payload(&mut self, payload: bytes::Bytes) -> $crate::error::MqttResult<()> {
                self.core.message_mut().set_payload(payload)
            }

            fn qos(&self) -> u8 {
                self.core.message().qos()
            }

            fn set_qos(&mut self, qos: i32) -> $crate::error::MqttResult<()> {
                self.core.message_mut().set_qos(qos)
            }

            fn is_retained(&self) -> bool {
                self.core.message().is_retained()
            }

            fn set_retained(&mut self, retained: bool) -> $crate::error::MqttResult<()> {
                self.core.message_mut().set_retained(retained)
            }

            fn topic(&self) -> Option<&str> {
                self.core.topic()
            }

            fn set_topic(&mut self, topic: String) {
                self.core.set_topic(topic)
            }

            fn message_id(&self) -> u16 {
                self.core.message().message_id()
            }

            fn acknowledge(&self) {
                self.core.acknowledge()
            }

            fn is_acknowledged(&self) -> bool {
                self.core.is_acknowledged()
            }

            fn native_message(&self) -> &$crate::message::MqttMessage {
                self.core.message()
            }
        }
    };
}

pub mod v3;
pub mod v5;

pub use v3::MqttV3BindingContext;
pub use v5::MqttV5BindingContext;
