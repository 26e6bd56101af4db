//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback orchestrator:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the orchestrator core depends
//! on. It establishes the logging conventions, the configuration builder and
//! the event broadcasting used to observe scheduling decisions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
