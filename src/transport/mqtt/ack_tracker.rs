//! Request/acknowledgment correlation
//!
//! rumqttc hands requests to its event loop through a channel and only later
//! reports the packet id it assigned (`Outgoing::*` events). Requests are
//! queued here in send order, matched FIFO to those events, and completed when
//! the broker's acknowledgment for that packet id arrives.

use crate::error::MqttError;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Wire request kinds that receive a packet id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Publish,
    Subscribe,
    Unsubscribe,
}

/// Completion channel of one request
pub type Completion = oneshot::Sender<Result<(), MqttError>>;

#[derive(Debug)]
struct PendingRequest {
    kind: RequestKind,
    qos: u8,
    /// Topic or filter set, for error messages
    label: String,
    completion: Option<Completion>,
}

impl PendingRequest {
    fn complete(mut self, result: Result<(), String>) {
        let outcome = result.map_err(|message| self.failure(message));
        if let Some(tx) = self.completion.take() {
            // Caller may have given up waiting
            let _ = tx.send(outcome);
        }
    }

    fn fail_with(mut self, error: MqttError) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(error));
        }
    }

    fn failure(&self, message: String) -> MqttError {
        match self.kind {
            RequestKind::Publish => MqttError::publish(&self.label, message),
            RequestKind::Subscribe | RequestKind::Unsubscribe => {
                MqttError::subscription(self.label.split(", "), message)
            }
        }
    }
}

/// Tracks requests from send until acknowledgment
#[derive(Debug, Default)]
pub struct AckTracker {
    queued: VecDeque<PendingRequest>,
    in_flight: HashMap<(RequestKind, u16), PendingRequest>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request about to be handed to the client
    ///
    /// `completion` is `None` for internally generated requests (re-subscribe)
    /// whose outcome nobody awaits.
    pub fn enqueue(
        &mut self,
        kind: RequestKind,
        qos: u8,
        label: impl Into<String>,
        completion: Option<Completion>,
    ) {
        self.queued.push_back(PendingRequest {
            kind,
            qos,
            label: label.into(),
            completion,
        });
    }

    /// Drop the most recently queued request after the client refused it
    pub fn cancel_last(&mut self) {
        self.queued.pop_back();
    }

    /// The event loop wrote a request with packet id `pkid`
    pub fn on_request_sent(&mut self, kind: RequestKind, pkid: u16) {
        if pkid != 0 && self.in_flight.contains_key(&(kind, pkid)) {
            debug!(?kind, pkid, "Retransmission of in-flight packet");
            return;
        }

        let position = match self.queued.front() {
            Some(front) if front.kind == kind => Some(0),
            _ => self.queued.iter().position(|p| p.kind == kind),
        };
        let Some(request) = position.and_then(|index| self.queued.remove(index)) else {
            debug!(?kind, pkid, "Outgoing packet with no pending request");
            return;
        };
        if position != Some(0) {
            warn!(?kind, pkid, "Outgoing packet out of request order");
        }

        if kind == RequestKind::Publish && request.qos == 0 {
            request.complete(Ok(()));
        } else {
            self.in_flight.insert((kind, pkid), request);
        }
    }

    /// PUBACK for a QoS 1 publish
    pub fn on_puback(&mut self, pkid: u16, result: Result<(), String>) {
        self.finish(RequestKind::Publish, pkid, result);
    }

    /// PUBREC for a QoS 2 publish; success waits for PUBCOMP
    pub fn on_pubrec(&mut self, pkid: u16, result: Result<(), String>) {
        if result.is_err() {
            self.finish(RequestKind::Publish, pkid, result);
        }
    }

    /// PUBCOMP for a QoS 2 publish
    pub fn on_pubcomp(&mut self, pkid: u16, result: Result<(), String>) {
        self.finish(RequestKind::Publish, pkid, result);
    }

    pub fn on_suback(&mut self, pkid: u16, result: Result<(), String>) {
        self.finish(RequestKind::Subscribe, pkid, result);
    }

    pub fn on_unsuback(&mut self, pkid: u16, result: Result<(), String>) {
        self.finish(RequestKind::Unsubscribe, pkid, result);
    }

    fn finish(&mut self, kind: RequestKind, pkid: u16, result: Result<(), String>) {
        match self.in_flight.remove(&(kind, pkid)) {
            Some(request) => request.complete(result),
            None => debug!(?kind, pkid, "Acknowledgment for unknown packet"),
        }
    }

    /// Complete everything still pending with `ConnectionLost`
    pub fn fail_all(&mut self) {
        let pending = self.queued.drain(..).chain(self.in_flight.drain().map(|(_, r)| r));
        for request in pending {
            request.fail_with(MqttError::ConnectionLost);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.queued.len() + self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        tracker: &mut AckTracker,
        kind: RequestKind,
        qos: u8,
        label: &str,
    ) -> oneshot::Receiver<Result<(), MqttError>> {
        let (tx, rx) = oneshot::channel();
        tracker.enqueue(kind, qos, label, Some(tx));
        rx
    }

    #[test]
    fn test_qos0_publish_completes_when_sent() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Publish, 0, "a/b");

        tracker.on_request_sent(RequestKind::Publish, 0);
        assert!(matches!(rx.try_recv(), Ok(Ok(()))));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_qos1_publish_waits_for_puback() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Publish, 1, "a/b");

        tracker.on_request_sent(RequestKind::Publish, 5);
        assert!(rx.try_recv().is_err());

        tracker.on_puback(5, Ok(()));
        assert!(matches!(rx.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_qos2_publish_waits_for_pubcomp() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Publish, 2, "a/b");

        tracker.on_request_sent(RequestKind::Publish, 3);
        tracker.on_pubrec(3, Ok(()));
        assert!(rx.try_recv().is_err());

        tracker.on_pubcomp(3, Ok(()));
        assert!(matches!(rx.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_rejected_pubcomp_fails_publish() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Publish, 2, "a/b");

        tracker.on_request_sent(RequestKind::Publish, 8);
        tracker.on_pubrec(8, Ok(()));
        tracker.on_pubcomp(8, Err("PacketIdentifierNotFound".to_string()));

        match rx.try_recv() {
            Ok(Err(MqttError::Publish { topic, message })) => {
                assert_eq!(topic, "a/b");
                assert!(message.contains("PacketIdentifierNotFound"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_rejected_pubrec_fails_publish() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Publish, 2, "a/b");

        tracker.on_request_sent(RequestKind::Publish, 3);
        tracker.on_pubrec(3, Err("NotAuthorized".to_string()));
        match rx.try_recv() {
            Ok(Err(MqttError::Publish { topic, message })) => {
                assert_eq!(topic, "a/b");
                assert!(message.contains("NotAuthorized"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_requests_correlate_in_send_order() {
        let mut tracker = AckTracker::new();
        let mut first = request(&mut tracker, RequestKind::Publish, 1, "first");
        let mut sub = request(&mut tracker, RequestKind::Subscribe, 1, "x/#");
        let mut second = request(&mut tracker, RequestKind::Publish, 1, "second");

        tracker.on_request_sent(RequestKind::Publish, 1);
        tracker.on_request_sent(RequestKind::Subscribe, 2);
        tracker.on_request_sent(RequestKind::Publish, 3);

        tracker.on_puback(3, Err("rejected".to_string()));
        assert!(matches!(
            second.try_recv(),
            Ok(Err(MqttError::Publish { ref topic, .. })) if topic == "second"
        ));

        tracker.on_suback(2, Ok(()));
        assert!(matches!(sub.try_recv(), Ok(Ok(()))));

        tracker.on_puback(1, Ok(()));
        assert!(matches!(first.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_retransmission_is_not_recorrelated() {
        let mut tracker = AckTracker::new();
        let mut first = request(&mut tracker, RequestKind::Publish, 1, "first");
        tracker.on_request_sent(RequestKind::Publish, 1);

        let mut second = request(&mut tracker, RequestKind::Publish, 1, "second");
        // Resent after reconnect with the same packet id
        tracker.on_request_sent(RequestKind::Publish, 1);
        tracker.on_request_sent(RequestKind::Publish, 2);

        tracker.on_puback(1, Ok(()));
        tracker.on_puback(2, Ok(()));
        assert!(matches!(first.try_recv(), Ok(Ok(()))));
        assert!(matches!(second.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_cancel_last_removes_unsent_request() {
        let mut tracker = AckTracker::new();
        let _kept = request(&mut tracker, RequestKind::Subscribe, 1, "kept");
        let _cancelled = request(&mut tracker, RequestKind::Subscribe, 1, "cancelled");
        tracker.cancel_last();
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_suback_failure_carries_filters() {
        let mut tracker = AckTracker::new();
        let mut rx = request(&mut tracker, RequestKind::Subscribe, 1, "a/+, b/#");

        tracker.on_request_sent(RequestKind::Subscribe, 4);
        tracker.on_suback(4, Err("Failure".to_string()));
        match rx.try_recv() {
            Ok(Err(MqttError::Subscription { topics, .. })) => {
                assert!(topics.contains("a/+"));
                assert!(topics.contains("b/#"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_fail_all_reports_connection_lost() {
        let mut tracker = AckTracker::new();
        let mut publish = request(&mut tracker, RequestKind::Publish, 1, "a/b");
        let mut unsubscribe = request(&mut tracker, RequestKind::Unsubscribe, 1, "a/b");
        tracker.on_request_sent(RequestKind::Publish, 1);

        // The publish is in flight, the unsubscribe is still queued
        tracker.fail_all();
        assert!(matches!(publish.try_recv(), Ok(Err(MqttError::ConnectionLost))));
        assert!(matches!(unsubscribe.try_recv(), Ok(Err(MqttError::ConnectionLost))));
        assert_eq!(tracker.pending_count(), 0);
    }
}
