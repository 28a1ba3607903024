//! mqtt-bind - protocol-version-agnostic MQTT client binding
//!
//! One interface for MQTT 3.1.1 and MQTT 5 over `rumqttc`: connection setup
//! (including mutual TLS), subscriptions with automatic or manual
//! acknowledgment, and non-blocking publishes.
//!
//! # Overview
//!
//! - [`client::ConnectionBuilder`] validates a [`config::ClientConfig`],
//!   loads TLS material through [`ssl`] and blocks until the broker accepts
//!   the connection
//! - [`client::SubscriptionManager`] subscribes consumers; each delivery
//!   arrives as a [`bind::BindingContext`]
//! - [`client::PublishDispatcher`] publishes a [`message::MqttMessage`] and
//!   reports the outcome to a completion listener
//! - [`health`] reports connection health
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqtt_bind::bind::{BindingContext, MqttV5BindingContext};
//! use mqtt_bind::client::MqttConnection;
//! use mqtt_bind::config::ClientConfig;
//! use mqtt_bind::message::MqttMessage;
//! use std::collections::BTreeMap;
//!
//! # tokio_test::block_on(async {
//! let mut config = ClientConfig::new("tcp://localhost:1883", "sensor-gateway");
//! config.manual_acks = true;
//! let connection = MqttConnection::connect(config).await?;
//!
//! let subscriptions = connection.subscription_manager::<MqttV5BindingContext>()?;
//! let filters = BTreeMap::from([("sensors/#".to_string(), 1)]);
//! subscriptions
//!     .subscribe(&filters, |context: MqttV5BindingContext| {
//!         println!("{:?}: {:?}", context.topic(), context.payload());
//!         context.acknowledge();
//!     })
//!     .await?;
//!
//! connection.publisher().publish(
//!     "sensors/temp",
//!     &MqttMessage::with_payload("21.5"),
//!     |result| println!("published: {}", result.is_ok()),
//! )?;
//!
//! connection.disconnect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod bind;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod message;
pub mod observability;
pub mod ssl;
pub mod testing;
pub mod transport;

pub use error::{MqttError, MqttResult};
