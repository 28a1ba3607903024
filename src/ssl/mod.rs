//! TLS trust and identity material
//!
//! Turns certificate, private key and CA bytes (from any [`Readable`] source)
//! into a [`KeyManager`] / [`TrustManager`] pair and finally a rustls client
//! configuration handed to the transport.

pub mod material;
pub mod resource;
pub mod verifier;

pub use material::{
    build_client_tls_config, build_key_manager, build_trust_manager, load_certificates,
    load_private_key, KeyManager, TrustManager,
};
pub use resource::{EnvResource, FileResource, InlineResource, Readable, ResourceLocation};
