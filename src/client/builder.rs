//! Connection builder
//!
//! Validates a [`ClientConfig`], prepares TLS material, maps everything onto
//! rumqttc options and blocks until the broker has accepted the connection or
//! the connection timeout has elapsed.

use super::{PublishDispatcher, SubscriptionManager};
use crate::bind::FromInbound;
use crate::config::{ClientConfig, SslConfig};
use crate::error::{MqttError, MqttResult};
use crate::ssl::{build_client_tls_config, build_key_manager, build_trust_manager};
use crate::transport::mqtt::{
    configure_mqtt_options, ConnectionState, ReconnectPolicy, RumqttTransport, SessionSettings,
};
use crate::transport::MqttTransport;
use rumqttc::{TlsConfiguration, Transport};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds and opens the one connection a process owns
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    config: ClientConfig,
}

impl ConnectionBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate, build TLS material and perform the connect handshake
    ///
    /// TLS material errors are returned as they are; everything that goes
    /// wrong on the network, including the timeout, is `MqttError::Connection`.
    pub async fn connect(self) -> MqttResult<MqttConnection> {
        let config = self.config;
        config.validate()?;

        if config.has_credentials()
            && config
                .active_ssl()
                .is_some_and(SslConfig::has_client_identity)
        {
            warn!(
                client_id = %config.client_id,
                "Both username/password and client certificate authentication are configured; the broker will see both"
            );
        }

        let transport = Self::prepare_tls(&config)?;
        let options = configure_mqtt_options(&config, transport)?;
        let settings = SessionSettings {
            client_id: config.client_id.clone(),
            connection_timeout: config.connection_timeout(),
            reconnect: ReconnectPolicy::from_config(&config),
            manual_acks: config.manual_acks,
        };

        info!(
            server_uri = %config.server_uri,
            client_id = %config.client_id,
            protocol = %config.protocol_version,
            "Connecting to MQTT broker"
        );
        let transport = Arc::new(RumqttTransport::connect(options, settings).await?);
        info!(client_id = %config.client_id, "Connected to MQTT broker");

        Ok(MqttConnection {
            client: transport.clone(),
            transport,
            manual_acks: config.manual_acks,
            closed: false,
        })
    }

    /// TLS transport for `ssl`/`mqtts` servers, `None` for plain TCP
    pub fn prepare_tls(config: &ClientConfig) -> MqttResult<Option<Transport>> {
        if !config.server_address()?.scheme.is_tls() {
            return Ok(None);
        }

        let Some(ssl) = config.active_ssl().filter(|ssl| ssl.has_any_material()) else {
            if !config.hostname_verification {
                warn!("Hostname verification can only be disabled together with a configured certificate authority");
            }
            return Ok(Some(Transport::tls_with_default_config()));
        };

        let ca = ssl.certificate_authority.as_ref().ok_or_else(|| {
            MqttError::invalid_config("ssl.certificate_authority is required with certificate material")
        })?;
        let trust_manager = build_trust_manager(ca.open()?.as_ref())?;

        let key_manager = match (&ssl.certificate, &ssl.private_key) {
            (Some(certificate), Some(private_key)) => {
                let password = ssl.resolved_password();
                Some(build_key_manager(
                    certificate.open()?.as_ref(),
                    private_key.open()?.as_ref(),
                    password.as_deref(),
                )?)
            }
            _ => None,
        };

        let tls = build_client_tls_config(
            key_manager.as_ref(),
            &trust_manager,
            config.hostname_verification,
        )?;
        Ok(Some(Transport::tls_with_config(TlsConfiguration::Rustls(
            Arc::new(tls),
        ))))
    }
}

/// Owning handle of the connected client
///
/// Subscription managers and publish dispatchers built from it hold weak
/// handles and fail with `ConnectionLost` once it is dropped. Only this handle
/// closes the connection; dropping it without calling
/// [`MqttConnection::disconnect`] stops the event loop.
pub struct MqttConnection {
    transport: Arc<RumqttTransport>,
    client: Arc<dyn MqttTransport>,
    manual_acks: bool,
    closed: bool,
}

impl MqttConnection {
    pub async fn connect(config: ClientConfig) -> MqttResult<Self> {
        ConnectionBuilder::new(config).connect().await
    }

    /// Strong handle to the client; holding it keeps the transport alive
    pub fn client(&self) -> Arc<dyn MqttTransport> {
        self.client.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn client_identifier(&self) -> &str {
        self.client.client_identifier()
    }

    pub fn state(&self) -> ConnectionState {
        self.client.connection_state()
    }

    pub fn manual_acks(&self) -> bool {
        self.manual_acks
    }

    pub fn subscription_manager<C: FromInbound>(&self) -> MqttResult<SubscriptionManager<C>> {
        SubscriptionManager::new(self.client(), self.manual_acks)
    }

    pub fn publisher(&self) -> PublishDispatcher {
        PublishDispatcher::new(self.client())
    }

    /// Send DISCONNECT and stop the event loop; pending requests fail with
    /// `ConnectionLost`
    pub async fn disconnect(mut self) -> MqttResult<()> {
        self.closed = true;
        self.transport.disconnect().await
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.transport.request_shutdown();
        }
    }
}
