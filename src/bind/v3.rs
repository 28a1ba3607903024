//! MQTT 3.1.1 binding context

use super::{ContextCore, FromInbound};
use crate::config::ProtocolVersion;
use crate::transport::{InboundPublish, MqttTransport};
use std::sync::Weak;

/// Binding context for MQTT 3.1.1 messages; carries no properties
#[derive(Debug)]
pub struct MqttV3BindingContext {
    core: ContextCore,
}

delegate_binding_context!(MqttV3BindingContext, ProtocolVersion::V3);

impl FromInbound for MqttV3BindingContext {
    const PROTOCOL: ProtocolVersion = ProtocolVersion::V3;

    fn from_inbound(
        inbound: InboundPublish,
        client: Weak<dyn MqttTransport>,
        manual_acks: bool,
    ) -> Self {
        Self {
            core: ContextCore::inbound(inbound, false, client, manual_acks),
        }
    }

    fn for_publish(client: Weak<dyn MqttTransport>) -> Self {
        Self {
            core: ContextCore::outbound(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::BindingContext;
    use crate::error::MqttError;
    use crate::message::MqttProperties;
    use crate::testing::MockTransport;
    use bytes::Bytes;
    use std::sync::Arc;

    fn inbound_context(
        transport: &Arc<MockTransport>,
        qos: u8,
        manual_acks: bool,
    ) -> MqttV3BindingContext {
        let client: Arc<dyn MqttTransport> = transport.clone();
        MqttV3BindingContext::from_inbound(
            MockTransport::inbound("sensors/temp", vec![0x01, 0x02], qos, 42),
            Arc::downgrade(&client),
            manual_acks,
        )
    }

    #[test]
    fn test_inbound_context_fields() {
        let transport = MockTransport::v3();
        let context = inbound_context(&transport, 1, false);

        assert_eq!(context.topic(), Some("sensors/temp"));
        assert_eq!(context.payload().as_ref(), &[0x01, 0x02]);
        assert_eq!(context.qos(), 1);
        assert_eq!(context.message_id(), 42);
        assert!(!context.is_retained());
        assert_eq!(context.protocol_version(), ProtocolVersion::V3);
        assert!(!context.native_message().is_mutable());
    }

    #[test]
    fn test_inbound_context_is_frozen() {
        let transport = MockTransport::v3();
        let mut context = inbound_context(&transport, 1, false);

        assert!(matches!(
            context.set_payload(Bytes::from_static(b"changed")),
            Err(MqttError::ImmutableMessage)
        ));
        assert!(matches!(context.set_qos(0), Err(MqttError::ImmutableMessage)));
        assert!(matches!(
            context.set_retained(true),
            Err(MqttError::ImmutableMessage)
        ));
        assert_eq!(context.payload().as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn test_v3_context_drops_properties() {
        let transport = MockTransport::v3();
        let client: Arc<dyn MqttTransport> = transport.clone();
        let inbound = MockTransport::inbound_with_properties(
            "a/b",
            "x",
            0,
            0,
            MqttProperties::new().with_user_property("k", "v"),
        );

        let context = MqttV3BindingContext::from_inbound(inbound, Arc::downgrade(&client), false);
        assert!(context.native_message().properties().is_none());
    }

    #[test]
    fn test_manual_ack_is_idempotent() {
        let transport = MockTransport::v3();
        let context = inbound_context(&transport, 1, true);

        context.acknowledge();
        context.acknowledge();

        assert!(context.is_acknowledged());
        assert_eq!(transport.acknowledgments(), vec![42]);
    }

    #[test]
    fn test_auto_ack_mode_never_acknowledges() {
        let transport = MockTransport::v3();
        let context = inbound_context(&transport, 1, false);

        for _ in 0..3 {
            context.acknowledge();
        }

        assert!(!context.is_acknowledged());
        assert!(transport.acknowledgments().is_empty());
    }

    #[test]
    fn test_qos0_delivery_needs_no_ack() {
        let transport = MockTransport::v3();
        let context = inbound_context(&transport, 0, true);

        context.acknowledge();
        assert!(transport.acknowledgments().is_empty());
    }

    #[test]
    fn test_ack_failure_is_logged_not_raised() {
        let transport = MockTransport::v3();
        transport.fail_acknowledge("channel closed");
        let context = inbound_context(&transport, 2, true);

        context.acknowledge();
        context.acknowledge();
        assert_eq!(transport.acknowledgments(), vec![42]);
    }

    #[test]
    fn test_ack_after_client_dropped() {
        let transport = MockTransport::v3();
        let context = inbound_context(&transport, 1, true);
        drop(transport);

        // Weak reference is dead; must not panic
        context.acknowledge();
        assert!(context.is_acknowledged());
    }

    #[test]
    fn test_outbound_context_is_mutable_without_topic() {
        let transport = MockTransport::v3();
        let client: Arc<dyn MqttTransport> = transport.clone();
        let mut context = MqttV3BindingContext::for_publish(Arc::downgrade(&client));

        assert_eq!(context.topic(), None);
        context.set_topic("devices/1/cmd".to_string());
        context.set_payload(Bytes::from_static(b"on")).unwrap();
        context.set_qos(2).unwrap();
        context.set_retained(true).unwrap();

        assert_eq!(context.topic(), Some("devices/1/cmd"));
        assert_eq!(context.qos(), 2);
        assert!(context.is_retained());
        assert!(matches!(context.set_qos(5), Err(MqttError::InvalidQos(5))));

        // Never came from the wire
        context.acknowledge();
        assert!(transport.acknowledgments().is_empty());
    }
}
