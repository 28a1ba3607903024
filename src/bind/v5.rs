//! MQTT 5 binding context

use super::{ContextCore, FromInbound};
use crate::config::ProtocolVersion;
use crate::error::MqttResult;
use crate::message::MqttProperties;
use crate::transport::{InboundPublish, MqttTransport};
use std::sync::Weak;

/// Binding context for MQTT 5 messages
///
/// Adds correlation data and user properties on top of the shared contract.
#[derive(Debug)]
pub struct MqttV5BindingContext {
    core: ContextCore,
}

delegate_binding_context!(MqttV5BindingContext, ProtocolVersion::V5);

impl MqttV5BindingContext {
    pub fn properties(&self) -> Option<&MqttProperties> {
        self.core.message().properties()
    }

    pub fn set_properties(&mut self, properties: MqttProperties) -> MqttResult<()> {
        self.core.message_mut().set_properties(Some(properties))
    }
}

impl FromInbound for MqttV5BindingContext {
    const PROTOCOL: ProtocolVersion = ProtocolVersion::V5;

    fn from_inbound(
        inbound: InboundPublish,
        client: Weak<dyn MqttTransport>,
        manual_acks: bool,
    ) -> Self {
        Self {
            core: ContextCore::inbound(inbound, true, client, manual_acks),
        }
    }

    fn for_publish(client: Weak<dyn MqttTransport>) -> Self {
        Self {
            core: ContextCore::outbound(client),
        }
    }
}
