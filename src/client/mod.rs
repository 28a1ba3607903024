//! Client-facing binding layer
//!
//! - [`builder`] - opens the connection and owns it
//! - [`subscriber`] - subscribes consumers and builds a context per delivery
//! - [`publisher`] - non-blocking publishes with completion listeners

pub mod builder;
pub mod publisher;
pub mod subscriber;

pub use builder::{ConnectionBuilder, MqttConnection};
pub use publisher::{PublishDispatcher, PublishListener};
pub use subscriber::SubscriptionManager;
