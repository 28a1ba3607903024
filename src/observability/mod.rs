//! Observability for the MQTT binding
//!
//! Structured logging via `tracing`; health reporting lives in
//! [`crate::health`].

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat, LoggingSettings};

// Span macros for structured logging
pub use logging::mqtt_span;
