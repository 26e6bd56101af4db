//! # Host Bridge Traits
//!
//! Collaborator contracts the host platform implements for the playback
//! orchestrator.
//!
//! ## Overview
//!
//! The orchestrator decides *when* media sessions are prepared, played,
//! paused, reset and released. Everything that actually touches the platform
//! sits behind the traits in this crate:
//!
//! ### Media
//! - [`Bridge`](playback::Bridge) - Per-session handle to the decode/render engine
//! - [`RendererProvider`](renderer::RendererProvider) - Renderer variant selection and creation
//!
//! ### Platform Integration
//! - [`Host`](lifecycle::Host) - Lifecycle scope claiming containers
//! - [`MemoryMonitor`](memory::MemoryMonitor) - System memory pressure
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert their own failures into it and keep the
//! message actionable (which renderer, which memory query).
//!
//! ## Thread Safety
//!
//! Orchestrator state is confined to one control thread, but collaborators
//! are shared with platform callbacks, so shared traits require `Send + Sync`
//! and bridges require `Send`.

pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod platform;
pub mod playback;
pub mod renderer;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use lifecycle::{
    ContainerId, ContainerKind, ContainerRef, Host, HostId, HostLifecycle, RootId,
};
pub use memory::{MemoryInfo, MemoryMonitor};
pub use playback::{
    Bridge, DrmInfo, Media, PlaybackInfo, PlayerState, RendererHandle, VolumeInfo,
};
pub use renderer::{RendererContext, RendererProvider, VariantKey};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
