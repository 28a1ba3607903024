//! Pure connection state management for the MQTT client
//!
//! This module contains pure functions for connection state management,
//! reconnect backoff, and translating [`ClientConfig`] into rumqttc options.

use crate::config::{ClientConfig, ProtocolVersion, V5Restrictions, WillMessage};
use crate::error::{MqttError, MqttResult};
use rumqttc::Transport as RumqttcTransport;
use std::fmt;
use std::time::Duration;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - waiting for the first CONNACK
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Disconnected with reason
    Disconnected(String),
    /// Waiting to reconnect (attempt count)
    Reconnecting(u32),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected(reason) => write!(f, "Disconnected ({reason})"),
            ConnectionState::Reconnecting(attempt) => write!(f, "Reconnecting (attempt {attempt})"),
        }
    }
}

/// Reconnection policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Reconnect after connection loss at all
    pub enabled: bool,
    /// Delay before the first attempt, doubled per attempt
    pub initial_delay: Duration,
    /// Upper bound for the delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            enabled: config.automatic_reconnect,
            max_delay: config.max_reconnect_delay(),
            ..Default::default()
        }
    }

    /// Exponential backoff: initial, 2x, 4x, ... capped at `max_delay`
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Transport options for either protocol version
pub enum WireOptions {
    V3(rumqttc::MqttOptions),
    V5(rumqttc::v5::MqttOptions),
}

impl WireOptions {
    pub fn protocol_version(&self) -> ProtocolVersion {
        match self {
            WireOptions::V3(_) => ProtocolVersion::V3,
            WireOptions::V5(_) => ProtocolVersion::V5,
        }
    }
}

impl fmt::Debug for WireOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireOptions::V3(options) => f
                .debug_struct("WireOptions::V3")
                .field("client_id", &options.client_id())
                .field("broker", &options.broker_address())
                .finish_non_exhaustive(),
            WireOptions::V5(options) => f
                .debug_struct("WireOptions::V5")
                .field("client_id", &options.client_id())
                .field("broker", &options.broker_address())
                .finish_non_exhaustive(),
        }
    }
}

pub(crate) fn qos_v3(qos: u8) -> MqttResult<rumqttc::QoS> {
    match qos {
        0 => Ok(rumqttc::QoS::AtMostOnce),
        1 => Ok(rumqttc::QoS::AtLeastOnce),
        2 => Ok(rumqttc::QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(i32::from(other))),
    }
}

pub(crate) fn qos_v5(qos: u8) -> MqttResult<rumqttc::v5::mqttbytes::QoS> {
    use rumqttc::v5::mqttbytes::QoS;
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(i32::from(other))),
    }
}

/// Pure function to build rumqttc options from config
///
/// `transport` is the prepared TLS transport, if the server uri asks for one.
pub fn configure_mqtt_options(
    config: &ClientConfig,
    transport: Option<RumqttcTransport>,
) -> MqttResult<WireOptions> {
    let address = config.server_address()?;
    let password = config.resolved_password().unwrap_or_default();

    match config.protocol_version {
        ProtocolVersion::V3 => {
            let mut options =
                rumqttc::MqttOptions::new(&config.client_id, &address.host, address.port);
            options.set_keep_alive(config.keep_alive());
            options.set_clean_session(config.clean_start);
            options.set_manual_acks(config.manual_acks);
            if let Some(transport) = transport {
                options.set_transport(transport);
            }
            if let Some(username) = config.username.as_ref().filter(|u| !u.is_empty()) {
                options.set_credentials(username, &password);
            }
            if let Some(will) = &config.will_message {
                options.set_last_will(last_will_v3(will)?);
            }
            Ok(WireOptions::V3(options))
        }
        ProtocolVersion::V5 => {
            let mut options =
                rumqttc::v5::MqttOptions::new(&config.client_id, &address.host, address.port);
            options.set_keep_alive(config.keep_alive());
            options.set_clean_start(config.clean_start);
            options.set_manual_acks(config.manual_acks);
            if let Some(transport) = transport {
                options.set_transport(transport);
            }
            if let Some(username) = config.username.as_ref().filter(|u| !u.is_empty()) {
                options.set_credentials(username, &password);
            }
            if let Some(will) = &config.will_message {
                options.set_last_will(last_will_v5(will)?);
            }
            apply_v5_restrictions(&mut options, &config.v5_restrictions());
            Ok(WireOptions::V5(options))
        }
    }
}

fn last_will_v3(will: &WillMessage) -> MqttResult<rumqttc::LastWill> {
    Ok(rumqttc::LastWill::new(
        &will.topic,
        will.payload.as_bytes().to_vec(),
        qos_v3(will.qos)?,
        will.retained,
    ))
}

fn last_will_v5(will: &WillMessage) -> MqttResult<rumqttc::v5::mqttbytes::v5::LastWill> {
    Ok(rumqttc::v5::mqttbytes::v5::LastWill::new(
        &will.topic,
        will.payload.as_bytes().to_vec(),
        qos_v5(will.qos)?,
        will.retained,
        None,
    ))
}

fn apply_v5_restrictions(options: &mut rumqttc::v5::MqttOptions, restrictions: &V5Restrictions) {
    // Zero means "not sent" for the optional CONNECT properties
    options.set_receive_maximum(Some(restrictions.receive_maximum));
    options.set_max_packet_size(Some(restrictions.maximum_packet_size));
    options.set_topic_alias_max(Some(restrictions.topic_alias_maximum).filter(|v| *v > 0));
    options.set_request_response_info(Some(u8::from(restrictions.request_response_info)));
    options.set_request_problem_info(Some(u8::from(restrictions.request_problem_info)));
    if !restrictions.user_properties.is_empty() {
        options.set_user_properties(
            restrictions
                .user_properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
    }
    // No dedicated setter for session expiry; it rides in the CONNECT properties
    let mut properties = options.connect_properties().unwrap_or_default();
    properties.session_expiry_interval =
        Some(restrictions.session_expiry_interval).filter(|v| *v > 0);
    options.set_connect_properties(properties);
}
