//! # Core Runtime Module
//!
//! Ambient infrastructure shared by the player crates:
//! - Logging and tracing setup with host log forwarding
//! - Player configuration ([`config::RuntimeConfig`])
//! - The outward player event bus ([`events::EventBus`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Error, Result};
pub use events::{EventBus, EventStream, PlayerEvent};
