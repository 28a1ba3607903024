//! Mock implementations for testing
//!
//! [`MockTransport`] records every wire request it is asked to make, can be
//! told to fail specific operations, and delivers simulated inbound publishes
//! to the handlers registered through `subscribe`.

use crate::config::ProtocolVersion;
use crate::error::{MqttError, MqttResult};
use crate::message::MqttProperties;
use crate::transport::topics::topic_matches;
use crate::transport::{
    ConnectionState, DeliveryCallback, InboundPublish, MqttTransport, OutboundPublish,
    PublishHandle,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One request as it would have gone to the broker
#[derive(Debug, Clone, PartialEq)]
pub enum WireRequest {
    Publish(OutboundPublish),
    Subscribe(Vec<(String, u8)>),
    Unsubscribe(Vec<String>),
    Acknowledge { pkid: u16 },
    Disconnect,
}

#[derive(Debug, Default, Clone)]
struct FailurePlan {
    publish: Option<String>,
    subscribe: Option<String>,
    unsubscribe: Option<String>,
    acknowledge: Option<String>,
}

/// Mock transport for testing
pub struct MockTransport {
    protocol: ProtocolVersion,
    client_id: String,
    state: Mutex<ConnectionState>,
    requests: Mutex<Vec<WireRequest>>,
    handlers: Mutex<Vec<(String, DeliveryCallback)>>,
    failures: Mutex<FailurePlan>,
    publish_delay: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new(protocol: ProtocolVersion) -> Self {
        Self {
            protocol,
            client_id: "mock-client".to_string(),
            state: Mutex::new(ConnectionState::Connected),
            requests: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            failures: Mutex::new(FailurePlan::default()),
            publish_delay: Mutex::new(None),
        }
    }

    pub fn v3() -> Arc<Self> {
        Arc::new(Self::new(ProtocolVersion::V3))
    }

    pub fn v5() -> Arc<Self> {
        Arc::new(Self::new(ProtocolVersion::V5))
    }

    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    pub fn fail_publish<S: Into<String>>(&self, reason: S) {
        lock(&self.failures).publish = Some(reason.into());
    }

    pub fn fail_subscribe<S: Into<String>>(&self, reason: S) {
        lock(&self.failures).subscribe = Some(reason.into());
    }

    pub fn fail_unsubscribe<S: Into<String>>(&self, reason: S) {
        lock(&self.failures).unsubscribe = Some(reason.into());
    }

    pub fn fail_acknowledge<S: Into<String>>(&self, reason: S) {
        lock(&self.failures).acknowledge = Some(reason.into());
    }

    /// Hold every publish for `delay` before resolving it
    pub fn delay_publish(&self, delay: Duration) {
        *lock(&self.publish_delay) = Some(delay);
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        lock(&self.requests).clone()
    }

    pub fn published(&self) -> Vec<OutboundPublish> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                WireRequest::Publish(publish) => Some(publish),
                _ => None,
            })
            .collect()
    }

    pub fn subscribe_requests(&self) -> Vec<Vec<(String, u8)>> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                WireRequest::Subscribe(filters) => Some(filters),
                _ => None,
            })
            .collect()
    }

    /// Packet ids acknowledged so far, in order
    pub fn acknowledgments(&self) -> Vec<u16> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                WireRequest::Acknowledge { pkid } => Some(pkid),
                _ => None,
            })
            .collect()
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn clear_history(&self) {
        lock(&self.requests).clear();
    }

    /// Build an inbound publish as the wire transport would report it
    pub fn inbound<T: Into<String>, B: Into<Bytes>>(
        topic: T,
        payload: B,
        qos: u8,
        pkid: u16,
    ) -> InboundPublish {
        InboundPublish {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain: false,
            dup: false,
            pkid,
            properties: None,
            handle: PublishHandle::detached(pkid, qos),
        }
    }

    /// Inbound MQTT 5 publish carrying properties
    pub fn inbound_with_properties<T: Into<String>, B: Into<Bytes>>(
        topic: T,
        payload: B,
        qos: u8,
        pkid: u16,
        properties: MqttProperties,
    ) -> InboundPublish {
        InboundPublish {
            properties: Some(properties),
            ..Self::inbound(topic, payload, qos, pkid)
        }
    }

    /// Hand `inbound` to every matching handler; returns how many ran
    pub fn deliver(&self, inbound: InboundPublish) -> usize {
        let callbacks: Vec<DeliveryCallback> = lock(&self.handlers)
            .iter()
            .filter(|(filter, _)| topic_matches(filter, &inbound.topic))
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in &callbacks {
            callback(inbound.clone());
        }
        callbacks.len()
    }

    fn record(&self, request: WireRequest) {
        lock(&self.requests).push(request);
    }

    fn require_connected(&self) -> MqttResult<()> {
        match self.connection_state() {
            ConnectionState::Connected => Ok(()),
            state => Err(MqttError::NotConnected {
                state: state.to_string(),
            }),
        }
    }
}

#[async_trait]
impl MqttTransport for MockTransport {
    fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    fn client_identifier(&self) -> &str {
        &self.client_id
    }

    fn connection_state(&self) -> ConnectionState {
        lock(&self.state).clone()
    }

    async fn publish(&self, request: OutboundPublish) -> MqttResult<()> {
        self.require_connected()?;
        let topic = request.topic.clone();
        self.record(WireRequest::Publish(request));

        let delay = *lock(&self.publish_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = lock(&self.failures).publish.clone();
        match failure {
            Some(reason) => Err(MqttError::publish(topic, reason)),
            None => Ok(()),
        }
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, u8)>,
        callback: DeliveryCallback,
    ) -> MqttResult<()> {
        self.require_connected()?;
        self.record(WireRequest::Subscribe(filters.clone()));

        let failure = lock(&self.failures).subscribe.clone();
        if let Some(reason) = failure {
            return Err(MqttError::subscription(
                filters.into_iter().map(|(filter, _)| filter),
                reason,
            ));
        }

        let mut handlers = lock(&self.handlers);
        for (filter, _) in filters {
            handlers.retain(|(existing, _)| existing != &filter);
            handlers.push((filter, callback.clone()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, filters: Vec<String>) -> MqttResult<()> {
        self.record(WireRequest::Unsubscribe(filters.clone()));
        lock(&self.handlers).retain(|(filter, _)| !filters.contains(filter));

        let failure = lock(&self.failures).unsubscribe.clone();
        match failure {
            Some(reason) => Err(MqttError::subscription(filters, reason)),
            None => Ok(()),
        }
    }

    fn acknowledge(&self, handle: &PublishHandle) -> MqttResult<()> {
        self.record(WireRequest::Acknowledge { pkid: handle.pkid() });

        let failure = lock(&self.failures).acknowledge.clone();
        match failure {
            Some(reason) => Err(MqttError::connection(reason)),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.record(WireRequest::Disconnect);
        self.set_state(ConnectionState::Disconnected("Client disconnected".to_string()));
        Ok(())
    }
}
