//! Outbound service integrations.

pub mod traccar;

pub use traccar::{normalize_base_url, Resource, TraccarClient, Transport, UpstreamError};
