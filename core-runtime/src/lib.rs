//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the subtitle platform core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the core runtime utilities that other modules depend on.
//! It establishes the logging conventions, the configuration surface, and the
//! in-process event fan-out mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, MediaServerConfig};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventType, SubscriptionId};
