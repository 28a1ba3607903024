//! Pure message routing for MQTT events
//!
//! rumqttc reports 3.1.1 and 5 traffic through different packet types. Both are
//! mapped here onto one [`EventRoute`] so the event loop supervisor handles a
//! single vocabulary.

use super::ack_tracker::RequestKind;
use crate::message::{MqttProperties, UserProperty};
use crate::transport::{InboundPublish, PublishHandle};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged { session_present: bool },
    /// Publish received on a subscribed topic
    MessageReceived(InboundPublish),
    /// PUBACK (QoS 1 complete)
    PublishAcknowledged { pkid: u16, result: Result<(), String> },
    /// PUBREC (QoS 2 first half); only failures are final
    PublishReceived { pkid: u16, result: Result<(), String> },
    /// PUBCOMP (QoS 2 complete)
    PublishCompleted { pkid: u16, result: Result<(), String> },
    /// SUBACK
    SubscriptionConfirmed { pkid: u16, result: Result<(), String> },
    /// UNSUBACK
    UnsubscriptionConfirmed { pkid: u16, result: Result<(), String> },
    /// MQTT broker sent DISCONNECT
    Disconnected,
    /// A request left the client and now has a packet id
    RequestSent { kind: RequestKind, pkid: u16 },
    /// Our DISCONNECT went out
    DisconnectSent,
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event with nothing to correlate
    OutgoingEvent,
}

impl MessageHandler {
    /// Route an MQTT 3.1.1 event (pure routing decision)
    pub fn route_v3_event(event: &rumqttc::Event) -> EventRoute {
        use rumqttc::{Event, Packet, SubscribeReasonCode};

        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EventRoute::ConnectionAcknowledged {
                    session_present: connack.session_present,
                },
                Packet::Publish(publish) => {
                    EventRoute::MessageReceived(Self::inbound_from_v3(publish))
                }
                Packet::PubAck(ack) => EventRoute::PublishAcknowledged {
                    pkid: ack.pkid,
                    result: Ok(()),
                },
                Packet::PubRec(rec) => EventRoute::PublishReceived {
                    pkid: rec.pkid,
                    result: Ok(()),
                },
                Packet::PubComp(comp) => EventRoute::PublishCompleted {
                    pkid: comp.pkid,
                    result: Ok(()),
                },
                Packet::SubAck(suback) => {
                    let codes: Vec<String> = suback
                        .return_codes
                        .iter()
                        .map(|code| format!("{code:?}"))
                        .collect();
                    let all_granted = suback
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                    EventRoute::SubscriptionConfirmed {
                        pkid: suback.pkid,
                        result: Self::validate_subscription_success(all_granted, &codes),
                    }
                }
                Packet::UnsubAck(unsuback) => EventRoute::UnsubscriptionConfirmed {
                    pkid: unsuback.pkid,
                    result: Ok(()),
                },
                Packet::Disconnect => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(outgoing) => Self::route_outgoing(outgoing),
        }
    }

    /// Route an MQTT 5 event (pure routing decision)
    pub fn route_v5_event(event: &rumqttc::v5::Event) -> EventRoute {
        use rumqttc::v5::mqttbytes::v5::{
            Packet, PubAckReason, PubCompReason, PubRecReason, SubscribeReasonCode,
            UnsubAckReason,
        };
        use rumqttc::v5::Event;

        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EventRoute::ConnectionAcknowledged {
                    session_present: connack.session_present,
                },
                Packet::Publish(publish) => {
                    EventRoute::MessageReceived(Self::inbound_from_v5(publish))
                }
                Packet::PubAck(ack) => EventRoute::PublishAcknowledged {
                    pkid: ack.pkid,
                    result: match ack.reason {
                        PubAckReason::Success | PubAckReason::NoMatchingSubscribers => Ok(()),
                        ref reason => Err(format!("broker rejected publish: {reason:?}")),
                    },
                },
                Packet::PubRec(rec) => EventRoute::PublishReceived {
                    pkid: rec.pkid,
                    result: match rec.reason {
                        PubRecReason::Success | PubRecReason::NoMatchingSubscribers => Ok(()),
                        ref reason => Err(format!("broker rejected publish: {reason:?}")),
                    },
                },
                Packet::PubComp(comp) => EventRoute::PublishCompleted {
                    pkid: comp.pkid,
                    result: match comp.reason {
                        PubCompReason::Success => Ok(()),
                        ref reason => Err(format!("broker rejected publish release: {reason:?}")),
                    },
                },
                Packet::SubAck(suback) => {
                    let codes: Vec<String> = suback
                        .return_codes
                        .iter()
                        .map(|code| format!("{code:?}"))
                        .collect();
                    let all_granted = suback
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                    EventRoute::SubscriptionConfirmed {
                        pkid: suback.pkid,
                        result: Self::validate_subscription_success(all_granted, &codes),
                    }
                }
                Packet::UnsubAck(unsuback) => {
                    let rejected: Vec<String> = unsuback
                        .reasons
                        .iter()
                        .filter(|reason| {
                            !matches!(
                                reason,
                                UnsubAckReason::Success | UnsubAckReason::NoSubscriptionExisted
                            )
                        })
                        .map(|reason| format!("{reason:?}"))
                        .collect();
                    EventRoute::UnsubscriptionConfirmed {
                        pkid: unsuback.pkid,
                        result: if rejected.is_empty() {
                            Ok(())
                        } else {
                            Err(format!("broker rejected unsubscribe: {rejected:?}"))
                        },
                    }
                }
                Packet::Disconnect(_) => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(outgoing) => Self::route_outgoing(outgoing),
        }
    }

    fn route_outgoing(outgoing: &rumqttc::Outgoing) -> EventRoute {
        use rumqttc::Outgoing;

        match outgoing {
            Outgoing::Publish(pkid) => EventRoute::RequestSent {
                kind: RequestKind::Publish,
                pkid: *pkid,
            },
            Outgoing::Subscribe(pkid) => EventRoute::RequestSent {
                kind: RequestKind::Subscribe,
                pkid: *pkid,
            },
            Outgoing::Unsubscribe(pkid) => EventRoute::RequestSent {
                kind: RequestKind::Unsubscribe,
                pkid: *pkid,
            },
            Outgoing::Disconnect => EventRoute::DisconnectSent,
            _ => EventRoute::OutgoingEvent,
        }
    }

    /// Validate subscription success from SubAck codes (pure function)
    pub fn validate_subscription_success(all_granted: bool, codes: &[String]) -> Result<(), String> {
        if all_granted {
            Ok(())
        } else {
            Err(format!("Subscription failed with return codes: {codes:?}"))
        }
    }

    /// Build the protocol-neutral inbound record from a 3.1.1 publish
    pub fn inbound_from_v3(publish: &rumqttc::Publish) -> InboundPublish {
        InboundPublish {
            topic: publish.topic.clone(),
            payload: publish.payload.clone(),
            qos: publish.qos as u8,
            retain: publish.retain,
            dup: publish.dup,
            pkid: publish.pkid,
            properties: None,
            handle: PublishHandle::v3(publish.clone()),
        }
    }

    /// Build the protocol-neutral inbound record from a 5 publish
    pub fn inbound_from_v5(publish: &rumqttc::v5::mqttbytes::v5::Publish) -> InboundPublish {
        let properties = publish.properties.as_ref().map(|props| MqttProperties {
            correlation_data: props.correlation_data.clone(),
            user_properties: props
                .user_properties
                .iter()
                .map(|(key, value)| UserProperty::new(key.clone(), value.clone()))
                .collect(),
        });

        InboundPublish {
            topic: String::from_utf8_lossy(&publish.topic).to_string(),
            payload: publish.payload.clone(),
            qos: publish.qos as u8,
            retain: publish.retain,
            dup: publish.dup,
            pkid: publish.pkid,
            properties,
            handle: PublishHandle::v5(publish.clone()),
        }
    }
}
