//! Reading pipeline services
//!
//! Decoding raw payloads into calibrated values and publishing them to the hub.

pub mod decoder;
pub mod publisher;

pub use decoder::{SensorDecoder, SensorPolicy};
pub use publisher::{ChannelPublisher, HubSink, TracingSink};
