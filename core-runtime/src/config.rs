//! # Orchestrator Configuration
//!
//! Provides configuration management for the playback orchestrator.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! [`OrchestratorConfig`] holding the injected collaborators and scheduler
//! tunables. Validation is fail-fast: `build()` refuses values the scheduler
//! cannot honour instead of clamping them silently.
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Time source for deferred work (default: [`SystemClock`])
//! - `MemoryMonitor` - Memory pressure source used by [`MemoryMode::Auto`].
//!   Without one, `Auto` resolves conservatively to [`MemoryMode::Low`].
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{MemoryMode, OrchestratorConfig};
//! use std::time::Duration;
//!
//! let config = OrchestratorConfig::builder()
//!     .default_memory_mode(MemoryMode::Balanced)
//!     .release_grace(Duration::from_millis(300))
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.high_mode_reset_distance, 8);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::OrchestratorConfig;
//!
//! // Visibility is a fraction, 1.5 is rejected
//! let config = OrchestratorConfig::builder()
//!     .visibility_threshold(1.5)
//!     .build()
//!     .expect("Should fail - threshold out of range");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, MemoryMonitor, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How aggressively unselected bindings give up their resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Resolved from system memory pressure: `Low` under pressure, `Balanced`
    /// otherwise.
    #[default]
    Auto,
    /// Release every unselected binding.
    Low,
    /// Reset bindings next to the selection, release the rest.
    Normal,
    /// Like `Normal`, but neighbours are only paused, not reset.
    Balanced,
    /// Keep everything within the High-mode distance warm. Client opt-in.
    High,
    /// Never release because of distance. Client opt-in.
    Infinite,
}

impl MemoryMode {
    /// Resolve `Auto` against a memory pressure reading.
    ///
    /// A failed or missing reading (`None`) is treated as pressure.
    pub fn resolve(self, low_memory: Option<bool>) -> MemoryMode {
        match self {
            MemoryMode::Auto => match low_memory {
                Some(false) => MemoryMode::Balanced,
                _ => MemoryMode::Low,
            },
            other => other,
        }
    }
}

/// Configuration for the playback orchestrator.
///
/// Use [`OrchestratorConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// Time source for the deferred-work dispatcher
    pub clock: Arc<dyn Clock>,

    /// System memory pressure (optional)
    pub memory_monitor: Option<Arc<dyn MemoryMonitor>>,

    /// Memory mode used by `register` when the caller does not pick one
    pub default_memory_mode: MemoryMode,

    /// Grace window between deactivation and the actual bridge release
    pub release_grace: Duration,

    /// Delay of the startup pass scheduled when the first group is created
    pub startup_delay: Duration,

    /// Bindings up to this distance stay warm in `MemoryMode::High`
    pub high_mode_reset_distance: u32,

    /// Minimum visible fraction for a container to be selectable
    pub visibility_threshold: f32,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("clock", &"Clock { ... }")
            .field(
                "memory_monitor",
                &self
                    .memory_monitor
                    .as_ref()
                    .map(|_| "MemoryMonitor { ... }"),
            )
            .field("default_memory_mode", &self.default_memory_mode)
            .field("release_grace", &self.release_grace)
            .field("startup_delay", &self.startup_delay)
            .field("high_mode_reset_distance", &self.high_mode_reset_distance)
            .field("visibility_threshold", &self.visibility_threshold)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            memory_monitor: None,
            default_memory_mode: MemoryMode::Auto,
            release_grace: default_release_grace(),
            startup_delay: Duration::ZERO,
            high_mode_reset_distance: default_high_mode_reset_distance(),
            visibility_threshold: default_visibility_threshold(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(Error::Config(format!(
                "visibility_threshold must be between 0.0 and 1.0, got {}",
                self.visibility_threshold
            )));
        }

        if self.high_mode_reset_distance == 0 {
            return Err(Error::Config(
                "high_mode_reset_distance must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        if self.release_grace > Duration::from_secs(60) {
            return Err(Error::Config(
                "release_grace exceeds maximum of 60 seconds".to_string(),
            ));
        }

        Ok(())
    }

    /// Query the memory monitor, `None` when absent or failing.
    pub fn low_memory(&self) -> Option<bool> {
        let monitor = self.memory_monitor.as_ref()?;
        match monitor.is_low_memory() {
            Ok(low) => Some(low),
            Err(err) => {
                tracing::warn!(error = %err, "Memory query failed, assuming pressure");
                None
            }
        }
    }
}

fn default_release_grace() -> Duration {
    Duration::from_millis(500)
}

fn default_high_mode_reset_distance() -> u32 {
    8
}

fn default_visibility_threshold() -> f32 {
    0.65
}

/// Builder for constructing [`OrchestratorConfig`] instances.
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    clock: Option<Arc<dyn Clock>>,
    memory_monitor: Option<Arc<dyn MemoryMonitor>>,
    default_memory_mode: Option<MemoryMode>,
    release_grace: Option<Duration>,
    startup_delay: Option<Duration>,
    high_mode_reset_distance: Option<u32>,
    visibility_threshold: Option<f32>,
    event_buffer_size: Option<usize>,
}

impl OrchestratorConfigBuilder {
    /// Sets the time source. Tests typically inject a `ManualClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the memory monitor implementation (optional).
    pub fn memory_monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.memory_monitor = Some(monitor);
        self
    }

    /// Default: [`MemoryMode::Auto`]
    pub fn default_memory_mode(mut self, mode: MemoryMode) -> Self {
        self.default_memory_mode = Some(mode);
        self
    }

    /// Default: 500 ms
    pub fn release_grace(mut self, grace: Duration) -> Self {
        self.release_grace = Some(grace);
        self
    }

    /// Default: zero, the startup pass runs on the next pump
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    /// Default: 8
    pub fn high_mode_reset_distance(mut self, distance: u32) -> Self {
        self.high_mode_reset_distance = Some(distance);
        self
    }

    /// Default: 0.65
    pub fn visibility_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = Some(threshold);
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the configuration, validating every value.
    pub fn build(self) -> Result<OrchestratorConfig> {
        let defaults = OrchestratorConfig::default();
        let config = OrchestratorConfig {
            clock: self.clock.unwrap_or(defaults.clock),
            memory_monitor: self.memory_monitor,
            default_memory_mode: self
                .default_memory_mode
                .unwrap_or(defaults.default_memory_mode),
            release_grace: self.release_grace.unwrap_or(defaults.release_grace),
            startup_delay: self.startup_delay.unwrap_or(defaults.startup_delay),
            high_mode_reset_distance: self
                .high_mode_reset_distance
                .unwrap_or(defaults.high_mode_reset_distance),
            visibility_threshold: self
                .visibility_threshold
                .unwrap_or(defaults.visibility_threshold),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
        };

        config.validate()?;
        Ok(config)
    }
}
