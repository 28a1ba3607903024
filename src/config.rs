//! Connection configuration for the MQTT binding
//!
//! Configuration is plain data: it can be built in code with
//! [`ClientConfig::new`] or loaded from a TOML file. Optional sections (will
//! message, TLS material, MQTT 5 restrictions) are `Option`s so "not
//! configured" is a distinct state at every use site.
//!
//! ```toml
//! server_uri = "ssl://broker.local:8883"
//! client_id = "sensor-gateway"
//! protocol_version = "v5"
//! manual_acks = true
//!
//! [will_message]
//! topic = "gateways/sensor-gateway/status"
//! payload = "offline"
//! qos = 1
//! retained = true
//!
//! [ssl]
//! certificate = "file:/etc/mqtt/client.pem"
//! private_key = "file:/etc/mqtt/client-key.pem"
//! password_env = "MQTT_KEY_PASSWORD"
//! certificate_authority = "file:/etc/mqtt/ca.pem"
//! ```

use crate::error::{MqttError, MqttResult};
use crate::ssl::ResourceLocation;
use crate::transport::topics::validate_topic_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// MQTT protocol version spoken on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProtocolVersion {
    #[serde(rename = "v3", alias = "3.1.1", alias = "3")]
    V3,
    #[default]
    #[serde(rename = "v5", alias = "5")]
    V5,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V3 => write!(f, "MQTT 3.1.1"),
            ProtocolVersion::V5 => write!(f, "MQTT 5"),
        }
    }
}

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Broker URI, e.g. `tcp://localhost:1883` or `ssl://broker:8883`
    pub server_uri: String,
    /// Client identifier presented in CONNECT
    pub client_id: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_interval_secs: u16,
    /// Clean session (3.1.1) / clean start (5)
    #[serde(default = "default_true", alias = "clean_session")]
    pub clean_start: bool,
    #[serde(default)]
    pub automatic_reconnect: bool,
    #[serde(default = "default_max_reconnect_delay_secs")]
    pub max_reconnect_delay_secs: u64,
    /// Deliver messages unacknowledged; consumers call `acknowledge()`
    #[serde(default)]
    pub manual_acks: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    #[serde(default = "default_true")]
    pub hostname_verification: bool,
    pub will_message: Option<WillMessage>,
    pub ssl: Option<SslConfig>,
    pub v5: Option<V5Restrictions>,
}

/// Last will published by the broker when the client disappears
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WillMessage {
    pub topic: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retained: bool,
}

/// Certificate material for mutual TLS
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SslConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub certificate: Option<ResourceLocation>,
    pub private_key: Option<ResourceLocation>,
    /// Private key password
    pub password: Option<String>,
    /// Environment variable containing the private key password
    pub password_env: Option<String>,
    pub certificate_authority: Option<ResourceLocation>,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            certificate: None,
            private_key: None,
            password: None,
            password_env: None,
            certificate_authority: None,
        }
    }
}

impl SslConfig {
    /// Both halves of a client identity are configured
    pub fn has_client_identity(&self) -> bool {
        self.certificate.is_some() && self.private_key.is_some()
    }

    pub fn has_any_material(&self) -> bool {
        self.certificate.is_some()
            || self.private_key.is_some()
            || self.certificate_authority.is_some()
    }

    /// Key password from config or environment; empty when neither is set
    pub fn resolved_password(&self) -> Option<String> {
        self.password.clone().or_else(|| {
            self.password_env
                .as_ref()
                .and_then(|name| std::env::var(name).ok())
        })
    }
}

/// MQTT 5 connect restrictions and properties
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct V5Restrictions {
    #[serde(default)]
    pub session_expiry_interval: u32,
    #[serde(default = "default_receive_maximum")]
    pub receive_maximum: u16,
    #[serde(default = "default_maximum_packet_size")]
    pub maximum_packet_size: u32,
    #[serde(default)]
    pub topic_alias_maximum: u16,
    #[serde(default)]
    pub request_response_info: bool,
    #[serde(default = "default_true")]
    pub request_problem_info: bool,
    #[serde(default)]
    pub user_properties: BTreeMap<String, String>,
}

impl Default for V5Restrictions {
    fn default() -> Self {
        Self {
            session_expiry_interval: 0,
            receive_maximum: default_receive_maximum(),
            maximum_packet_size: default_maximum_packet_size(),
            topic_alias_maximum: 0,
            request_response_info: false,
            request_problem_info: true,
            user_properties: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_keep_alive_secs() -> u16 {
    60
}

fn default_max_reconnect_delay_secs() -> u64 {
    120
}

fn default_receive_maximum() -> u16 {
    65_535
}

fn default_maximum_packet_size() -> u32 {
    268_435_460
}

/// URI scheme of the broker address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Ssl,
}

impl Scheme {
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Ssl)
    }

    fn default_port(&self) -> u16 {
        match self {
            Scheme::Tcp => 1883,
            Scheme::Ssl => 8883,
        }
    }
}

/// Parsed broker address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn parse(uri: &str) -> MqttResult<Self> {
        let invalid = |reason: &str| MqttError::invalid_config(format!("server uri '{uri}' {reason}"));

        let url = Url::parse(uri).map_err(|_| invalid("is not a valid URI"))?;
        let scheme = match url.scheme() {
            "tcp" | "mqtt" => Scheme::Tcp,
            "ssl" | "mqtts" => Scheme::Ssl,
            other => return Err(invalid(&format!("has unsupported scheme '{other}'"))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("has no host"))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self { scheme, host, port })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] MqttError),
}

impl ClientConfig {
    /// Configuration with every optional field at its default
    pub fn new<U: Into<String>, C: Into<String>>(server_uri: U, client_id: C) -> Self {
        Self {
            server_uri: server_uri.into(),
            client_id: client_id.into(),
            protocol_version: ProtocolVersion::default(),
            connection_timeout_ms: default_connection_timeout_ms(),
            keep_alive_interval_secs: default_keep_alive_secs(),
            clean_start: true,
            automatic_reconnect: false,
            max_reconnect_delay_secs: default_max_reconnect_delay_secs(),
            manual_acks: false,
            username: None,
            password: None,
            password_env: None,
            hostname_verification: true,
            will_message: None,
            ssl: None,
            v5: None,
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and cross-field constraints
    pub fn validate(&self) -> MqttResult<()> {
        if self.server_uri.trim().is_empty() {
            return Err(MqttError::invalid_config("server_uri is required"));
        }
        if self.client_id.trim().is_empty() {
            return Err(MqttError::invalid_config("client_id is required"));
        }
        let address = ServerAddress::parse(&self.server_uri)?;

        if self.connection_timeout_ms == 0 {
            return Err(MqttError::invalid_config(
                "connection_timeout_ms must be greater than 0",
            ));
        }
        if self.automatic_reconnect && self.max_reconnect_delay_secs == 0 {
            return Err(MqttError::invalid_config(
                "max_reconnect_delay_secs must be greater than 0 when automatic_reconnect is set",
            ));
        }

        if let Some(will) = &self.will_message {
            validate_topic_name(&will.topic)
                .map_err(|e| MqttError::invalid_config(format!("will_message: {e}")))?;
            if will.qos > 2 {
                return Err(MqttError::invalid_config(format!(
                    "will_message qos {} is out of range",
                    will.qos
                )));
            }
        }

        if let Some(ssl) = self.ssl.as_ref().filter(|s| s.enabled) {
            if !address.scheme.is_tls() {
                return Err(MqttError::invalid_config(format!(
                    "ssl is enabled but server uri '{}' does not use the ssl scheme",
                    self.server_uri
                )));
            }
            if ssl.certificate.is_some() != ssl.private_key.is_some() {
                return Err(MqttError::invalid_config(
                    "ssl certificate and private_key must be configured together",
                ));
            }
            if ssl.has_client_identity() && ssl.certificate_authority.is_none() {
                return Err(MqttError::invalid_config(
                    "certificate-based authentication requires certificate_authority",
                ));
            }
        }

        if let Some(v5) = &self.v5 {
            if self.protocol_version != ProtocolVersion::V5 {
                return Err(MqttError::invalid_config(
                    "[v5] restrictions require protocol_version = \"v5\"",
                ));
            }
            if v5.receive_maximum == 0 {
                return Err(MqttError::invalid_config(
                    "v5.receive_maximum must be greater than 0",
                ));
            }
            if v5.maximum_packet_size == 0 {
                return Err(MqttError::invalid_config(
                    "v5.maximum_packet_size must be greater than 0",
                ));
            }
        }

        Ok(())
    }

    pub fn server_address(&self) -> MqttResult<ServerAddress> {
        ServerAddress::parse(&self.server_uri)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_interval_secs))
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_secs)
    }

    /// Password from config or its environment variable
    pub fn resolved_password(&self) -> Option<String> {
        self.password.clone().or_else(|| {
            self.password_env
                .as_ref()
                .and_then(|name| std::env::var(name).ok())
        })
    }

    /// Username set and non-empty
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Active TLS section, if the scheme and section both ask for one
    pub fn active_ssl(&self) -> Option<&SslConfig> {
        self.ssl.as_ref().filter(|s| s.enabled)
    }

    /// MQTT 5 restrictions, falling back to protocol defaults
    pub fn v5_restrictions(&self) -> V5Restrictions {
        self.v5.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let toml_content = r#"
server_uri = "tcp://localhost:1883"
client_id = "minimal"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.client_id, "minimal");
        assert_eq!(config.protocol_version, ProtocolVersion::V5);
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(120));
        assert!(config.clean_start);
        assert!(!config.automatic_reconnect);
        assert!(!config.manual_acks);
        assert!(config.hostname_verification);
        assert!(config.will_message.is_none());
        assert!(config.ssl.is_none());
        assert_eq!(config, ClientConfig::new("tcp://localhost:1883", "minimal"));
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
server_uri = "ssl://broker.local:8883"
client_id = "gateway"
protocol_version = "v5"
connection_timeout_ms = 2500
keep_alive_interval_secs = 30
clean_start = false
automatic_reconnect = true
max_reconnect_delay_secs = 30
manual_acks = true
username = "user"
password = "secret"

[will_message]
topic = "gateways/gateway/status"
payload = "offline"
qos = 1
retained = true

[ssl]
certificate = "file:/etc/mqtt/client.pem"
private_key = "file:/etc/mqtt/client-key.pem"
password = "changeit"
certificate_authority = "file:/etc/mqtt/ca.pem"

[v5]
session_expiry_interval = 3600
receive_maximum = 100
topic_alias_maximum = 10
request_response_info = true

[v5.user_properties]
site = "plant-1"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.connection_timeout(), Duration::from_millis(2500));
        assert!(!config.clean_start);
        assert!(config.manual_acks);
        assert_eq!(config.resolved_password().as_deref(), Some("secret"));

        let will = config.will_message.as_ref().unwrap();
        assert_eq!(will.topic, "gateways/gateway/status");
        assert!(will.retained);

        let ssl = config.active_ssl().unwrap();
        assert!(ssl.has_client_identity());
        assert_eq!(ssl.resolved_password().as_deref(), Some("changeit"));

        let v5 = config.v5_restrictions();
        assert_eq!(v5.session_expiry_interval, 3600);
        assert_eq!(v5.receive_maximum, 100);
        assert_eq!(v5.maximum_packet_size, 268_435_460);
        assert!(v5.request_problem_info);
        assert_eq!(v5.user_properties.get("site").map(String::as_str), Some("plant-1"));
    }

    #[test]
    fn test_clean_session_alias_and_v3() {
        let toml_content = r#"
server_uri = "tcp://localhost"
client_id = "legacy"
protocol_version = "3.1.1"
clean_session = false
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.protocol_version, ProtocolVersion::V3);
        assert!(!config.clean_start);
        assert_eq!(config.server_address().unwrap().port, 1883);
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(ClientConfig::new("", "id").validate().is_err());
        assert!(ClientConfig::new("tcp://localhost:1883", " ").validate().is_err());

        let result = ClientConfig::from_toml_str(r#"client_id = "x""#);
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_server_address_parsing() {
        let tls = ServerAddress::parse("ssl://broker.example.com").unwrap();
        assert_eq!(tls.scheme, Scheme::Ssl);
        assert_eq!(tls.host, "broker.example.com");
        assert_eq!(tls.port, 8883);

        let plain = ServerAddress::parse("mqtt://10.0.0.5:11883").unwrap();
        assert_eq!(plain.scheme, Scheme::Tcp);
        assert_eq!(plain.port, 11883);

        assert!(ServerAddress::parse("http://localhost:1883").is_err());
        assert!(ServerAddress::parse("not a uri").is_err());
    }

    #[test]
    fn test_ssl_requires_tls_scheme() {
        let mut config = ClientConfig::new("tcp://localhost:1883", "id");
        config.ssl = Some(SslConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ssl scheme"));

        // Disabled section is ignored
        config.ssl = Some(SslConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ssl_default_matches_parsed_section() {
        let toml_content = r#"
server_uri = "ssl://localhost:8883"
client_id = "tls"

[ssl]
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        let ssl = config.ssl.unwrap();
        assert!(ssl.enabled);
        assert_eq!(ssl, SslConfig::default());
    }

    #[test]
    fn test_certificate_auth_requires_ca() {
        let mut config = ClientConfig::new("ssl://localhost:8883", "id");
        config.ssl = Some(SslConfig {
            enabled: true,
            certificate: Some("file:/tmp/client.pem".parse().unwrap()),
            private_key: Some("file:/tmp/client-key.pem".parse().unwrap()),
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("certificate_authority"));

        if let Some(ssl) = config.ssl.as_mut() {
            ssl.certificate_authority = Some("file:/tmp/ca.pem".parse().unwrap());
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_certificate_without_key_rejected() {
        let mut config = ClientConfig::new("ssl://localhost:8883", "id");
        config.ssl = Some(SslConfig {
            enabled: true,
            certificate: Some("file:/tmp/client.pem".parse().unwrap()),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_will_message() {
        let mut config = ClientConfig::new("tcp://localhost:1883", "id");
        config.will_message = Some(WillMessage {
            topic: "status/#".to_string(),
            payload: String::new(),
            qos: 0,
            retained: false,
        });
        assert!(config.validate().is_err());

        config.will_message = Some(WillMessage {
            topic: "status".to_string(),
            payload: String::new(),
            qos: 3,
            retained: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_v5_section_requires_v5_protocol() {
        let mut config = ClientConfig::new("tcp://localhost:1883", "id");
        config.protocol_version = ProtocolVersion::V3;
        config.v5 = Some(V5Restrictions::default());
        assert!(config.validate().is_err());

        config.protocol_version = ProtocolVersion::V5;
        assert!(config.validate().is_ok());

        config.v5 = Some(V5Restrictions {
            receive_maximum: 0,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_from_env() {
        std::env::set_var("MQTT_BIND_TEST_PASSWORD", "from-env");
        let mut config = ClientConfig::new("tcp://localhost:1883", "id");
        config.password_env = Some("MQTT_BIND_TEST_PASSWORD".to_string());
        assert_eq!(config.resolved_password().as_deref(), Some("from-env"));

        config.password = Some("inline".to_string());
        assert_eq!(config.resolved_password().as_deref(), Some("inline"));
    }
}
