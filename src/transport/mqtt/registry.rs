//! Active subscriptions and their delivery callbacks

use crate::transport::topics::topic_matches;
use crate::transport::DeliveryCallback;

struct Registration {
    filter: String,
    qos: u8,
    callback: DeliveryCallback,
}

/// Filter -> callback table consulted for every inbound publish
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Registration>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every filter; an existing filter is replaced,
    /// matching broker semantics for a repeated SUBSCRIBE
    pub fn register(&mut self, filters: &[(String, u8)], callback: DeliveryCallback) {
        for (filter, qos) in filters {
            self.entries.retain(|entry| &entry.filter != filter);
            self.entries.push(Registration {
                filter: filter.clone(),
                qos: *qos,
                callback: callback.clone(),
            });
        }
    }

    pub fn remove(&mut self, filters: &[String]) {
        self.entries.retain(|entry| !filters.contains(&entry.filter));
    }

    /// Callbacks whose filter matches `topic`, in registration order
    pub fn matching(&self, topic: &str) -> Vec<DeliveryCallback> {
        self.entries
            .iter()
            .filter(|entry| topic_matches(&entry.filter, topic))
            .map(|entry| entry.callback.clone())
            .collect()
    }

    /// Every registered filter with its QoS, for re-subscription
    pub fn filters(&self) -> Vec<(String, u8)> {
        self.entries
            .iter()
            .map(|entry| (entry.filter.clone(), entry.qos))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
