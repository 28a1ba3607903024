//! Subscription manager
//!
//! Turns a filter -> QoS map into one SUBSCRIBE request and wraps every
//! matching delivery in a fresh binding context before handing it to the
//! consumer.

use crate::bind::FromInbound;
use crate::error::{MqttError, MqttResult};
use crate::message::validate_qos;
use crate::transport::topics::validate_topic_filter;
use crate::transport::{DeliveryCallback, InboundPublish, MqttTransport};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

/// Subscribes consumers of context type `C` to topic filters
///
/// Holds a weak handle: once the owner drops the client, subscribing fails
/// with `ConnectionLost`.
pub struct SubscriptionManager<C> {
    client: Weak<dyn MqttTransport>,
    manual_acks: bool,
    _context: PhantomData<fn() -> C>,
}

impl<C: FromInbound> SubscriptionManager<C> {
    /// Fails with `InvalidConfig` if `C` is built for a different protocol
    /// version than the connected client speaks
    pub fn new(client: Arc<dyn MqttTransport>, manual_acks: bool) -> MqttResult<Self> {
        let connected = client.protocol_version();
        if connected != C::PROTOCOL {
            return Err(MqttError::invalid_config(format!(
                "binding context for {} cannot be used with an {} client",
                C::PROTOCOL,
                connected
            )));
        }

        Ok(Self {
            client: Arc::downgrade(&client),
            manual_acks,
            _context: PhantomData,
        })
    }

    pub fn manual_acks(&self) -> bool {
        self.manual_acks
    }

    /// Subscribe to every filter in `filters` with a single request
    ///
    /// `on_message` runs for each delivery, in the order the transport
    /// delivers them. If the broker rejects the request no callback stays
    /// registered and the error names the filters.
    pub async fn subscribe<F>(&self, filters: &BTreeMap<String, i32>, on_message: F) -> MqttResult<()>
    where
        F: Fn(C) + Send + Sync + 'static,
    {
        let requested = Self::validate_filters(filters)?;
        let transport = self.client.upgrade().ok_or(MqttError::ConnectionLost)?;
        let names: Vec<&str> = requested.iter().map(|(f, _)| f.as_str()).collect();
        info!(filters = ?names, "Subscribing");

        let client = self.client.clone();
        let manual_acks = self.manual_acks;
        let callback: DeliveryCallback = Arc::new(move |inbound: InboundPublish| {
            on_message(C::from_inbound(inbound, client.clone(), manual_acks));
        });

        transport.subscribe(requested.clone(), callback).await.map_err(|e| match e {
            e @ MqttError::Subscription { .. } => e,
            other => MqttError::subscription(requested.iter().map(|(f, _)| f.as_str()), other.to_string()),
        })
    }

    /// Unsubscribe from `filters`; failures are logged and swallowed
    pub async fn unsubscribe<I, S>(&self, filters: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filters: Vec<String> = filters.into_iter().map(Into::into).collect();
        if filters.is_empty() {
            return;
        }

        let Some(transport) = self.client.upgrade() else {
            warn!(filters = ?filters, "Client is gone, nothing to unsubscribe");
            return;
        };

        match transport.unsubscribe(filters.clone()).await {
            Ok(()) => info!(filters = ?filters, "Unsubscribed"),
            Err(e) => warn!(filters = ?filters, "Failed to unsubscribe: {}", e),
        }
    }

    fn validate_filters(filters: &BTreeMap<String, i32>) -> MqttResult<Vec<(String, u8)>> {
        if filters.is_empty() {
            return Err(MqttError::invalid_topic("", "no topic filters given"));
        }

        filters
            .iter()
            .map(|(filter, qos)| -> MqttResult<(String, u8)> {
                validate_topic_filter(filter)?;
                Ok((filter.clone(), validate_qos(*qos)?))
            })
            .collect()
    }
}
