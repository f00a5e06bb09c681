//! # SOMS Common Library
//!
//! Shared code for the SOMS audio services including:
//! - Event types (AudioEvent enum) and the EventBus
//! - Audio priority and media reference types
//! - Configuration file discovery
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{AudioPriority, MediaRef};
