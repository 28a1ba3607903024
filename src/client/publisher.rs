//! Publish dispatcher
//!
//! Publishing never blocks the caller: the request runs on a spawned task and
//! its outcome is reported to a completion listener exactly once.

use crate::bind::{BindingContext, FromInbound, MqttV3BindingContext, MqttV5BindingContext};
use crate::config::ProtocolVersion;
use crate::error::{MqttError, MqttResult};
use crate::message::MqttMessage;
use crate::transport::topics::validate_topic_name;
use crate::transport::{MqttTransport, OutboundPublish};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Completion listener for one publish
pub type PublishListener = Box<dyn FnOnce(MqttResult<()>) + Send + 'static>;

/// Issues publishes against the shared client
///
/// Holds a weak handle: once the owner drops the client every publish
/// completes with `ConnectionLost`.
#[derive(Clone)]
pub struct PublishDispatcher {
    client: Weak<dyn MqttTransport>,
    protocol: ProtocolVersion,
}

impl PublishDispatcher {
    pub fn new(client: Arc<dyn MqttTransport>) -> Self {
        Self {
            protocol: client.protocol_version(),
            client: Arc::downgrade(&client),
        }
    }

    /// Publish `message` to `topic`
    ///
    /// An empty topic or one containing wildcards fails here, before anything
    /// is sent. Every other outcome goes to `on_complete`. Must be called from
    /// within a tokio runtime.
    pub fn publish<L>(&self, topic: &str, message: &MqttMessage, on_complete: L) -> MqttResult<()>
    where
        L: FnOnce(MqttResult<()>) + Send + 'static,
    {
        validate_topic_name(topic)?;

        let properties = match self.protocol {
            ProtocolVersion::V5 => message.properties().cloned(),
            ProtocolVersion::V3 => None,
        };
        let request = OutboundPublish {
            topic: topic.to_string(),
            payload: message.payload().clone(),
            qos: message.qos(),
            retain: message.is_retained(),
            properties,
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let topic = request.topic.clone();
            let result = match client.upgrade() {
                Some(client) => client.publish(request).await,
                None => Err(MqttError::ConnectionLost),
            };
            match &result {
                Ok(()) => debug!(topic = %topic, "Publish completed"),
                Err(e) => warn!(topic = %topic, "Publish failed: {}", e),
            }
            on_complete(result);
        });
        Ok(())
    }

    /// Publish the message held by an outbound binding context to its topic
    pub fn publish_context<L>(&self, context: &dyn BindingContext, on_complete: L) -> MqttResult<()>
    where
        L: FnOnce(MqttResult<()>) + Send + 'static,
    {
        let topic = context
            .topic()
            .ok_or_else(|| MqttError::invalid_topic("", "binding context has no topic"))?;
        self.publish(topic, context.native_message(), on_complete)
    }

    /// Empty outbound context matching the client's protocol version
    pub fn create_context(&self) -> Box<dyn BindingContext> {
        let client = self.client.clone();
        match self.protocol {
            ProtocolVersion::V3 => Box::new(MqttV3BindingContext::for_publish(client)),
            ProtocolVersion::V5 => Box::new(MqttV5BindingContext::for_publish(client)),
        }
    }
}
