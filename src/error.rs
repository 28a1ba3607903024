//! Error taxonomy for the MQTT binding layer
//!
//! Setup-time failures (connection, TLS material) are fatal to the calling
//! sequence and propagate synchronously. Per-operation failures travel through
//! the operation's own channel: the publish listener, the subscribe future.

use std::collections::BTreeSet;
use thiserror::Error;

/// Boxed transport-level cause
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for MQTT binding operations
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to subscribe to the topics {topics:?}: {message}")]
    Subscription {
        topics: BTreeSet<String>,
        message: String,
    },

    #[error("Publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    #[error("Failed to load certificate: {0}")]
    CertificateLoad(String),

    #[error("Failed to load private key: {0}")]
    PrivateKeyLoad(String),

    #[error("Failed to initialize trust manager: {0}")]
    TrustManagerInit(String),

    #[error("Failed to initialize key manager: {0}")]
    KeyManagerInit(String),

    #[error("Message is immutable and cannot be modified")]
    ImmutableMessage,

    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("Invalid QoS value: {0} (allowed: 0, 1, 2)")]
    InvalidQos(i32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not connected - current state: {state}")]
    NotConnected { state: String },

    #[error("Connection lost before the request completed")]
    ConnectionLost,

    #[error("Failed to read resource {location}: {source}")]
    Resource {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

impl MqttError {
    /// Create connection error without an underlying cause
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create connection error wrapping a transport cause
    pub fn connection_with<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create subscription error for a set of topic filters
    pub fn subscription<I, S, M>(topics: I, message: M) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        M: Into<String>,
    {
        Self::Subscription {
            topics: topics.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish<T: Into<String>, M: Into<String>>(topic: T, message: M) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create invalid topic error
    pub fn invalid_topic<T: Into<String>, R: Into<String>>(topic: T, reason: R) -> Self {
        Self::InvalidTopic {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for errors raised while preparing TLS material
    pub fn is_tls_material_error(&self) -> bool {
        matches!(
            self,
            MqttError::CertificateLoad(_)
                | MqttError::PrivateKeyLoad(_)
                | MqttError::TrustManagerInit(_)
                | MqttError::KeyManagerInit(_)
        )
    }
}

/// Result type for MQTT binding operations
pub type MqttResult<T> = Result<T, MqttError>;
