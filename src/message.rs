//! Protocol-neutral MQTT message envelope
//!
//! An [`MqttMessage`] carries payload, QoS, retain/dup flags, the wire message id
//! and, for MQTT 5 only, [`MqttProperties`]. Envelopes bound to a message that
//! has already been delivered are frozen: every setter then fails with
//! [`MqttError::ImmutableMessage`].

use crate::error::{MqttError, MqttResult};
use bytes::Bytes;

/// Default QoS for freshly constructed envelopes
pub const DEFAULT_QOS: u8 = 1;

/// Single MQTT 5 user property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProperty {
    pub key: String,
    pub value: String,
}

impl UserProperty {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// MQTT 5 publish properties carried by the envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MqttProperties {
    /// Correlation data for request/response flows
    pub correlation_data: Option<Bytes>,
    /// User properties, in wire order (keys may repeat)
    pub user_properties: Vec<UserProperty>,
}

impl MqttProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_data<B: Into<Bytes>>(mut self, data: B) -> Self {
        self.correlation_data = Some(data.into());
        self
    }

    pub fn with_user_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.user_properties.push(UserProperty::new(key, value));
        self
    }

    /// First value for `key`, if present
    pub fn user_property(&self, key: &str) -> Option<&str> {
        self.user_properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.correlation_data.is_none() && self.user_properties.is_empty()
    }
}

/// Protocol-neutral message envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    mutable: bool,
    payload: Bytes,
    qos: u8,
    retained: bool,
    dup: bool,
    message_id: u16,
    properties: Option<MqttProperties>,
}

impl Default for MqttMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttMessage {
    /// Empty payload, QoS 1, mutable
    pub fn new() -> Self {
        Self::with_payload(Bytes::new())
    }

    pub fn with_payload<B: Into<Bytes>>(payload: B) -> Self {
        Self {
            mutable: true,
            payload: payload.into(),
            qos: DEFAULT_QOS,
            retained: false,
            dup: false,
            message_id: 0,
            properties: None,
        }
    }

    fn ensure_mutable(&self) -> MqttResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(MqttError::ImmutableMessage)
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Toggle the mutability flag. Freezing is always allowed.
    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable = mutable;
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn set_payload<B: Into<Bytes>>(&mut self, payload: B) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.payload = payload.into();
        Ok(())
    }

    pub fn qos(&self) -> u8 {
        self.qos
    }

    pub fn set_qos(&mut self, qos: i32) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.qos = validate_qos(qos)?;
        Ok(())
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    pub fn set_retained(&mut self, retained: bool) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.retained = retained;
        Ok(())
    }

    pub fn is_dup(&self) -> bool {
        self.dup
    }

    pub fn set_dup(&mut self, dup: bool) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.dup = dup;
        Ok(())
    }

    /// Wire-assigned identifier; 0 for QoS 0 messages
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    pub fn set_message_id(&mut self, message_id: u16) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.message_id = message_id;
        Ok(())
    }

    /// MQTT 5 properties; always `None` for 3.1.1 messages
    pub fn properties(&self) -> Option<&MqttProperties> {
        self.properties.as_ref()
    }

    pub fn set_properties(&mut self, properties: Option<MqttProperties>) -> MqttResult<()> {
        self.ensure_mutable()?;
        self.properties = properties;
        Ok(())
    }
}

/// Check a QoS value against the range shared by MQTT 3.1.1 and 5
pub fn validate_qos(qos: i32) -> MqttResult<u8> {
    match qos {
        0..=2 => Ok(qos as u8),
        other => Err(MqttError::InvalidQos(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let message = MqttMessage::new();
        assert!(message.payload().is_empty());
        assert_eq!(message.qos(), 1);
        assert!(!message.is_retained());
        assert!(!message.is_dup());
        assert_eq!(message.message_id(), 0);
        assert!(message.is_mutable());
        assert!(message.properties().is_none());
    }

    #[test]
    fn test_with_payload() {
        let message = MqttMessage::with_payload(vec![0x01, 0x02]);
        assert_eq!(message.payload().as_ref(), &[0x01, 0x02]);
        assert_eq!(message.qos(), DEFAULT_QOS);
    }

    #[test]
    fn test_frozen_message_rejects_every_setter() {
        let mut message = MqttMessage::with_payload("frozen");
        message.set_mutable(false);

        assert!(matches!(
            message.set_payload("x"),
            Err(MqttError::ImmutableMessage)
        ));
        assert!(matches!(message.set_qos(0), Err(MqttError::ImmutableMessage)));
        assert!(matches!(
            message.set_retained(true),
            Err(MqttError::ImmutableMessage)
        ));
        assert!(matches!(message.set_dup(true), Err(MqttError::ImmutableMessage)));
        assert!(matches!(
            message.set_message_id(7),
            Err(MqttError::ImmutableMessage)
        ));
        assert!(matches!(
            message.set_properties(Some(MqttProperties::new())),
            Err(MqttError::ImmutableMessage)
        ));

        // Nothing changed
        assert_eq!(message.payload().as_ref(), b"frozen");
        assert_eq!(message.qos(), 1);
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let mut message = MqttMessage::new();
        assert!(matches!(message.set_qos(3), Err(MqttError::InvalidQos(3))));
        assert!(matches!(message.set_qos(-1), Err(MqttError::InvalidQos(-1))));
        assert_eq!(message.qos(), 1);
    }

    #[test]
    fn test_properties_lookup() {
        let props = MqttProperties::new()
            .with_correlation_data(&b"req-1"[..])
            .with_user_property("source", "sensor")
            .with_user_property("source", "duplicate");

        assert_eq!(props.user_property("source"), Some("sensor"));
        assert_eq!(props.user_property("missing"), None);
        assert_eq!(props.user_properties.len(), 2);
        assert!(!props.is_empty());
        assert!(MqttProperties::new().is_empty());
    }

    proptest! {
        #[test]
        fn envelope_fields_read_back(
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            qos in 0i32..=2,
            retained in any::<bool>(),
            dup in any::<bool>(),
            message_id in any::<u16>(),
        ) {
            let mut message = MqttMessage::with_payload(payload.clone());
            message.set_qos(qos).unwrap();
            message.set_retained(retained).unwrap();
            message.set_dup(dup).unwrap();
            message.set_message_id(message_id).unwrap();

            prop_assert_eq!(message.payload().as_ref(), payload.as_slice());
            prop_assert_eq!(i32::from(message.qos()), qos);
            prop_assert_eq!(message.is_retained(), retained);
            prop_assert_eq!(message.is_dup(), dup);
            prop_assert_eq!(message.message_id(), message_id);
        }

        #[test]
        fn out_of_range_qos_always_rejected(qos in prop_oneof![i32::MIN..0, 3..i32::MAX]) {
            let mut message = MqttMessage::new();
            prop_assert!(matches!(message.set_qos(qos), Err(MqttError::InvalidQos(_))));
        }
    }
}
