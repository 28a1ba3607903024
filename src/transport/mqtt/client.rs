//! Impure I/O operations for the MQTT client
//!
//! This module owns the rumqttc client and event loop: the supervisor task that
//! polls the event loop, applies reconnect policy, correlates acknowledgments
//! and dispatches inbound publishes, plus the [`MqttTransport`] implementation
//! that issues requests against it.

use super::ack_tracker::{AckTracker, Completion, RequestKind};
use super::connection::{qos_v3, qos_v5, ConnectionState, ReconnectPolicy, WireOptions};
use super::health_monitor::{ConnectionEvent, HealthMetrics, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler};
use super::registry::SubscriptionRegistry;
use crate::config::ProtocolVersion;
use crate::error::{BoxError, MqttError, MqttResult};
use crate::transport::{
    DeliveryCallback, InboundPublish, MqttTransport, OutboundPublish, PublishHandle, WirePublish,
};
use async_trait::async_trait;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of rumqttc's request channel
const REQUEST_CHANNEL_CAPACITY: usize = 64;
/// Time granted to the event loop to flush DISCONNECT
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Session parameters that live outside the rumqttc options
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub client_id: String,
    pub connection_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub manual_acks: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ConnectionStats {
    connected_at: Option<Instant>,
    reconnect_count: u32,
}

/// State shared between the transport handle and its supervisor task
struct SharedState {
    state_tx: watch::Sender<ConnectionState>,
    stats_tx: watch::Sender<ConnectionStats>,
    tracker: Mutex<AckTracker>,
    registry: RwLock<SubscriptionRegistry>,
    /// Held from enqueue to channel send so queue order equals wire order
    request_order: Mutex<()>,
}

impl SharedState {
    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            HealthMonitor::log_state_transition(&previous, &next);
        }
    }
}

/// rumqttc client for either protocol version
#[derive(Clone)]
enum WireClient {
    V3(rumqttc::AsyncClient),
    V5(rumqttc::v5::AsyncClient),
}

impl WireClient {
    async fn publish(&self, request: &OutboundPublish) -> MqttResult<()> {
        let result: Result<(), BoxError> = match self {
            WireClient::V3(client) => {
                let qos = qos_v3(request.qos)?;
                client
                    .publish_bytes(
                        request.topic.clone(),
                        qos,
                        request.retain,
                        request.payload.clone(),
                    )
                    .await
                    .map_err(Into::into)
            }
            WireClient::V5(client) => {
                let qos = qos_v5(request.qos)?;
                let properties = request.properties.as_ref().filter(|p| !p.is_empty());
                let sent = if let Some(properties) = properties {
                    let wire_properties = rumqttc::v5::mqttbytes::v5::PublishProperties {
                        correlation_data: properties.correlation_data.clone(),
                        user_properties: properties
                            .user_properties
                            .iter()
                            .map(|p| (p.key.clone(), p.value.clone()))
                            .collect(),
                        ..Default::default()
                    };
                    client
                        .publish_with_properties(
                            request.topic.clone(),
                            qos,
                            request.retain,
                            request.payload.clone(),
                            wire_properties,
                        )
                        .await
                } else {
                    client
                        .publish(
                            request.topic.clone(),
                            qos,
                            request.retain,
                            request.payload.clone(),
                        )
                        .await
                };
                sent.map_err(Into::into)
            }
        };
        result.map_err(|e| MqttError::publish(&request.topic, e.to_string()))
    }

    async fn subscribe_many(&self, filters: &[(String, u8)]) -> Result<(), BoxError> {
        match self {
            WireClient::V3(client) => {
                let mut wire = Vec::with_capacity(filters.len());
                for (filter, qos) in filters {
                    wire.push(rumqttc::SubscribeFilter::new(filter.clone(), qos_v3(*qos)?));
                }
                client.subscribe_many(wire).await?;
            }
            WireClient::V5(client) => {
                let mut wire = Vec::with_capacity(filters.len());
                for (filter, qos) in filters {
                    wire.push(rumqttc::v5::mqttbytes::v5::Filter::new(
                        filter.clone(),
                        qos_v5(*qos)?,
                    ));
                }
                client.subscribe_many(wire).await?;
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), BoxError> {
        match self {
            WireClient::V3(client) => client.unsubscribe(filter).await?,
            WireClient::V5(client) => client.unsubscribe(filter).await?,
        }
        Ok(())
    }

    fn try_ack(&self, handle: &PublishHandle) -> MqttResult<()> {
        let result: Result<(), BoxError> = match (self, handle.wire()) {
            (WireClient::V3(client), WirePublish::V3(publish)) => {
                client.try_ack(publish).map_err(Into::into)
            }
            (WireClient::V5(client), WirePublish::V5(publish)) => {
                client.try_ack(publish).map_err(Into::into)
            }
            (_, WirePublish::Detached) => Ok(()),
            _ => {
                return Err(MqttError::invalid_config(
                    "publish handle belongs to a different protocol version",
                ))
            }
        };
        result.map_err(|e| MqttError::connection_with("acknowledgment failed", e))
    }

    fn try_disconnect(&self) -> Result<(), BoxError> {
        match self {
            WireClient::V3(client) => client.try_disconnect()?,
            WireClient::V5(client) => client.try_disconnect()?,
        }
        Ok(())
    }
}

/// rumqttc event loop for either protocol version
enum WireEventLoop {
    V3(rumqttc::EventLoop),
    V5(rumqttc::v5::EventLoop),
}

impl WireEventLoop {
    async fn poll(&mut self) -> Result<EventRoute, String> {
        match self {
            WireEventLoop::V3(event_loop) => event_loop
                .poll()
                .await
                .map(|event| MessageHandler::route_v3_event(&event))
                .map_err(|e| e.to_string()),
            WireEventLoop::V5(event_loop) => event_loop
                .poll()
                .await
                .map(|event| MessageHandler::route_v5_event(&event))
                .map_err(|e| e.to_string()),
        }
    }
}

/// Issues tracked requests; shared by the transport and the supervisor
#[derive(Clone)]
struct RequestSender {
    client: WireClient,
    shared: Arc<SharedState>,
}

impl RequestSender {
    async fn publish(&self, request: &OutboundPublish) -> MqttResult<oneshot::Receiver<MqttResult<()>>> {
        let (tx, rx) = oneshot::channel();
        let _order = self.shared.request_order.lock().await;
        self.shared
            .tracker
            .lock()
            .await
            .enqueue(RequestKind::Publish, request.qos, &request.topic, Some(tx));

        if let Err(e) = self.client.publish(request).await {
            self.shared.tracker.lock().await.cancel_last();
            return Err(e);
        }
        Ok(rx)
    }

    async fn subscribe(
        &self,
        filters: &[(String, u8)],
        completion: Option<Completion>,
    ) -> MqttResult<()> {
        let names: Vec<&str> = filters.iter().map(|(f, _)| f.as_str()).collect();
        let _order = self.shared.request_order.lock().await;
        self.shared
            .tracker
            .lock()
            .await
            .enqueue(RequestKind::Subscribe, 1, names.join(", "), completion);

        if let Err(e) = self.client.subscribe_many(filters).await {
            self.shared.tracker.lock().await.cancel_last();
            return Err(MqttError::subscription(names, e.to_string()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> MqttResult<oneshot::Receiver<MqttResult<()>>> {
        let (tx, rx) = oneshot::channel();
        let _order = self.shared.request_order.lock().await;
        self.shared
            .tracker
            .lock()
            .await
            .enqueue(RequestKind::Unsubscribe, 1, filter, Some(tx));

        if let Err(e) = self.client.unsubscribe(filter).await {
            self.shared.tracker.lock().await.cancel_last();
            return Err(MqttError::subscription([filter], e.to_string()));
        }
        Ok(rx)
    }
}

/// Awaits a tracked request; a dropped completion means the event loop ended
async fn await_completion(rx: oneshot::Receiver<MqttResult<()>>) -> MqttResult<()> {
    rx.await.unwrap_or(Err(MqttError::ConnectionLost))
}

/// Event loop supervisor task
struct EventLoopSupervisor {
    client_id: String,
    requests: RequestSender,
    shutdown_rx: watch::Receiver<bool>,
    policy: ReconnectPolicy,
    manual_acks: bool,
    connected_once: bool,
}

impl EventLoopSupervisor {
    fn shared(&self) -> &SharedState {
        &self.requests.shared
    }

    async fn run(mut self, mut event_loop: WireEventLoop) {
        info!(client_id = %self.client_id, "Starting MQTT event loop");
        let mut reconnect_attempts = 0u32;
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                // Check for shutdown signal first (higher priority)
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event loop");
                        break;
                    }
                }
                polled = event_loop.poll() => {
                    let keep_running = match polled {
                        Ok(route) => self.process_event_route(route, &mut reconnect_attempts).await,
                        Err(error) => self.handle_event_loop_error(error, &mut reconnect_attempts).await,
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }

        // Close the request channel before failing what is still pending
        drop(event_loop);
        self.shared().tracker.lock().await.fail_all();
        if !matches!(*self.shared().state_tx.borrow(), ConnectionState::Disconnected(_)) {
            self.shared().transition(ConnectionEvent::DisconnectedByClient);
        }
        info!(client_id = %self.client_id, "MQTT event loop stopped");
    }

    /// Process routed MQTT event
    /// Returns true to continue loop, false to break
    async fn process_event_route(&mut self, route: EventRoute, reconnect_attempts: &mut u32) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged { session_present } => {
                let reconnected = self.connected_once;
                self.connected_once = true;
                *reconnect_attempts = 0;
                self.shared().stats_tx.send_modify(|stats| {
                    stats.connected_at = Some(Instant::now());
                    if reconnected {
                        stats.reconnect_count += 1;
                    }
                });
                self.shared().transition(ConnectionEvent::ConnAckReceived);
                if reconnected && !session_present {
                    self.resubscribe_to_topics().await;
                }
                true
            }
            EventRoute::MessageReceived(inbound) => {
                self.dispatch_message(inbound).await;
                true
            }
            EventRoute::RequestSent { kind, pkid } => {
                self.shared().tracker.lock().await.on_request_sent(kind, pkid);
                true
            }
            EventRoute::PublishAcknowledged { pkid, result } => {
                self.shared().tracker.lock().await.on_puback(pkid, result);
                true
            }
            EventRoute::PublishReceived { pkid, result } => {
                self.shared().tracker.lock().await.on_pubrec(pkid, result);
                true
            }
            EventRoute::PublishCompleted { pkid, result } => {
                self.shared().tracker.lock().await.on_pubcomp(pkid, result);
                true
            }
            EventRoute::SubscriptionConfirmed { pkid, result } => {
                tracing::debug!(target: "mqtt_transport", pkid, ?result, "Subscription confirmed");
                self.shared().tracker.lock().await.on_suback(pkid, result);
                true
            }
            EventRoute::UnsubscriptionConfirmed { pkid, result } => {
                tracing::debug!(target: "mqtt_transport", pkid, ?result, "Unsubscription confirmed");
                self.shared().tracker.lock().await.on_unsuback(pkid, result);
                true
            }
            EventRoute::Disconnected => {
                // The next poll reports the closed socket and decides on reconnection
                self.shared().transition(ConnectionEvent::DisconnectedByBroker);
                true
            }
            EventRoute::DisconnectSent => {
                info!("DISCONNECT sent to broker");
                false
            }
            EventRoute::InfrastructureEvent(event) => {
                tracing::debug!(target: "mqtt_transport", "MQTT event: {}", event);
                true
            }
            EventRoute::OutgoingEvent => true,
        }
    }

    /// Handle event loop error
    /// Returns true to continue loop (after backoff), false to break
    async fn handle_event_loop_error(&mut self, error: String, reconnect_attempts: &mut u32) -> bool {
        self.shared()
            .transition(ConnectionEvent::NetworkError(error.clone()));

        // Initial connect failures are reported by connect(), never retried
        if !self.connected_once {
            return false;
        }
        error!(client_id = %self.client_id, "MQTT event loop error: {}", error);

        let decision = HealthMonitor::should_attempt_reconnection(
            *reconnect_attempts,
            &self.policy,
            *self.shutdown_rx.borrow(),
        );
        match decision {
            ReconnectionDecision::Proceed { attempt, delay } => {
                *reconnect_attempts = attempt;
                self.shared()
                    .transition(ConnectionEvent::ReconnectionStarted(attempt));
                info!("Attempting reconnection {} after {:?} delay", attempt, delay);
                Self::interruptible_sleep(self.shutdown_rx.clone(), delay).await
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
            ReconnectionDecision::AbortDisabled => {
                warn!("Automatic reconnect is disabled, giving up the connection");
                false
            }
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Deliver to every matching callback, inline, in arrival order
    async fn dispatch_message(&self, inbound: InboundPublish) {
        let callbacks = self.shared().registry.read().await.matching(&inbound.topic);
        tracing::debug!(
            target: "mqtt_transport",
            topic = %inbound.topic,
            qos = inbound.qos,
            handlers = callbacks.len(),
            "Received MQTT message"
        );

        if callbacks.is_empty() {
            // Nobody will acknowledge it; keep the broker's window open
            if self.manual_acks && inbound.handle.requires_ack() {
                if let Err(e) = self.requests.client.try_ack(&inbound.handle) {
                    warn!(topic = %inbound.topic, "Failed to acknowledge unrouted message: {}", e);
                }
            }
            return;
        }

        for callback in callbacks {
            let delivery = inbound.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(delivery))).is_err() {
                error!(topic = %inbound.topic, "Message callback panicked");
            }
        }
    }

    /// Re-subscribe registered filters after a clean reconnect
    async fn resubscribe_to_topics(&self) {
        let filters = self.shared().registry.read().await.filters();
        if filters.is_empty() {
            return;
        }

        // Sending waits on channel capacity, which this task drains
        let requests = self.requests.clone();
        tokio::spawn(async move {
            match requests.subscribe(&filters, None).await {
                Ok(()) => {
                    tracing::debug!(target: "mqtt_transport", count = filters.len(), "Re-subscribed to topics")
                }
                Err(e) => error!("Failed to re-subscribe: {}", e),
            }
        });
    }
}

/// rumqttc-backed [`MqttTransport`]
pub struct RumqttTransport {
    client_id: String,
    protocol: ProtocolVersion,
    requests: RequestSender,
    state_rx: watch::Receiver<ConnectionState>,
    stats_rx: watch::Receiver<ConnectionStats>,
    shutdown_tx: watch::Sender<bool>,
    event_loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RumqttTransport {
    /// Start the event loop and wait for the first CONNACK
    ///
    /// Fails with `MqttError::Connection` if the broker refuses, the network
    /// fails, or `connection_timeout` elapses first.
    pub async fn connect(options: WireOptions, settings: SessionSettings) -> MqttResult<Self> {
        let protocol = options.protocol_version();
        let (client, event_loop) = match options {
            WireOptions::V3(options) => {
                let (client, event_loop) =
                    rumqttc::AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
                (WireClient::V3(client), WireEventLoop::V3(event_loop))
            }
            WireOptions::V5(options) => {
                let (client, event_loop) =
                    rumqttc::v5::AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
                (WireClient::V5(client), WireEventLoop::V5(event_loop))
            }
        };

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (stats_tx, stats_rx) = watch::channel(ConnectionStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(SharedState {
            state_tx,
            stats_tx,
            tracker: Mutex::new(AckTracker::new()),
            registry: RwLock::new(SubscriptionRegistry::new()),
            request_order: Mutex::new(()),
        });
        let requests = RequestSender { client, shared };

        let supervisor = EventLoopSupervisor {
            client_id: settings.client_id.clone(),
            requests: requests.clone(),
            shutdown_rx,
            policy: settings.reconnect.clone(),
            manual_acks: settings.manual_acks,
            connected_once: false,
        };
        let handle = tokio::spawn(supervisor.run(event_loop));

        if let Err(e) =
            Self::wait_for_connection_confirmation(state_rx.clone(), settings.connection_timeout)
                .await
        {
            handle.abort();
            return Err(e);
        }

        Ok(Self {
            client_id: settings.client_id,
            protocol,
            requests,
            state_rx,
            stats_rx,
            shutdown_tx,
            event_loop_handle: Mutex::new(Some(handle)),
        })
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> MqttResult<()> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(reason) => {
                        return Err(MqttError::connection(reason.clone()));
                    }
                    ConnectionState::Connecting | ConnectionState::Reconnecting(_) => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::connection("event loop ended before CONNACK"));
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(MqttError::connection(format!(
                "no CONNACK received within {timeout:?}"
            ))),
        }
    }

    /// Signal the event loop to stop without waiting for it
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn check_connection_state(&self, allowed: fn(&ConnectionState) -> bool) -> MqttResult<()> {
        let state = self.state_rx.borrow().clone();
        if allowed(&state) {
            Ok(())
        } else {
            Err(MqttError::NotConnected {
                state: state.to_string(),
            })
        }
    }

    fn shared(&self) -> &SharedState {
        &self.requests.shared
    }
}

#[async_trait]
impl MqttTransport for RumqttTransport {
    fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    fn client_identifier(&self) -> &str {
        &self.client_id
    }

    fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    fn health_metrics(&self) -> Option<HealthMetrics> {
        let stats = *self.stats_rx.borrow();
        Some(HealthMonitor::calculate_health_metrics(
            &self.connection_state(),
            stats.connected_at,
            stats.reconnect_count,
        ))
    }

    async fn publish(&self, request: OutboundPublish) -> MqttResult<()> {
        self.check_connection_state(HealthMonitor::can_publish)?;

        let completion = self.requests.publish(&request).await?;
        let result = await_completion(completion).await;
        tracing::debug!(target: "mqtt_transport", topic = %request.topic, qos = request.qos, ok = result.is_ok(), "Publish resolved");
        result
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, u8)>,
        callback: DeliveryCallback,
    ) -> MqttResult<()> {
        self.check_connection_state(HealthMonitor::can_subscribe)?;
        let names: Vec<String> = filters.iter().map(|(f, _)| f.clone()).collect();

        // Registered first so nothing delivered right after SUBACK is missed
        self.shared().registry.write().await.register(&filters, callback);

        let (tx, rx) = oneshot::channel();
        let outcome = match self.requests.subscribe(&filters, Some(tx)).await {
            Ok(()) => await_completion(rx).await,
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            self.shared().registry.write().await.remove(&names);
        }
        outcome
    }

    async fn unsubscribe(&self, filters: Vec<String>) -> MqttResult<()> {
        self.shared().registry.write().await.remove(&filters);

        let mut completions = Vec::with_capacity(filters.len());
        for filter in &filters {
            completions.push(self.requests.unsubscribe(filter).await?);
        }
        for completion in completions {
            await_completion(completion).await?;
        }
        Ok(())
    }

    fn acknowledge(&self, handle: &PublishHandle) -> MqttResult<()> {
        self.requests.client.try_ack(handle)
    }

    async fn disconnect(&self) -> MqttResult<()> {
        let Some(mut handle) = self.event_loop_handle.lock().await.take() else {
            return Ok(());
        };
        info!(client_id = %self.client_id, "Disconnecting MQTT client");

        let connected = matches!(self.connection_state(), ConnectionState::Connected);
        let graceful = connected
            && match self.requests.client.try_disconnect() {
                Ok(()) => true,
                Err(e) => {
                    debug!("DISCONNECT could not be queued: {}", e);
                    false
                }
            };
        if !graceful {
            let _ = self.shutdown_tx.send(true);
        }

        match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => info!("Event loop task shut down gracefully"),
            Ok(Err(e)) if !e.is_cancelled() => warn!("Event loop task ended with error: {}", e),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("Event loop task didn't shut down gracefully, forcing abort");
                let _ = self.shutdown_tx.send(true);
                handle.abort();
            }
        }

        // Covers the aborted case; a no-op after a clean stop
        self.shared().tracker.lock().await.fail_all();
        if !matches!(self.connection_state(), ConnectionState::Disconnected(_)) {
            self.shared().transition(ConnectionEvent::DisconnectedByClient);
        }
        info!("MQTT client disconnected");
        Ok(())
    }
}

impl Drop for RumqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop_handle.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_connected() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(ConnectionState::Connected);
            // Keep the sender alive until the waiter has seen the value
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let result =
            RumqttTransport::wait_for_connection_confirmation(rx, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_failure() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        let _ = tx.send(ConnectionState::Disconnected("connection refused".to_string()));

        let result =
            RumqttTransport::wait_for_connection_confirmation(rx, Duration::from_secs(1)).await;
        match result {
            Err(MqttError::Connection { message, .. }) => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_timeout() {
        let (_tx, rx) = watch::channel(ConnectionState::Connecting);

        let start = Instant::now();
        let result =
            RumqttTransport::wait_for_connection_confirmation(rx, Duration::from_millis(100))
                .await;
        assert!(matches!(result, Err(MqttError::Connection { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_connect_refused_fails_fast() {
        // Nothing listens on port 1 on a test machine
        let options = rumqttc::MqttOptions::new("refused-client", "127.0.0.1", 1);
        let settings = SessionSettings {
            client_id: "refused-client".to_string(),
            connection_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
            manual_acks: false,
        };

        let start = Instant::now();
        let result = RumqttTransport::connect(WireOptions::V3(options), settings).await;
        assert!(matches!(result, Err(MqttError::Connection { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
