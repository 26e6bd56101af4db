//! Workspace facade crate.
//!
//! Re-exports the workspace crates behind feature flags so host applications
//! can depend on `playback-orchestrator` alone:
//!
//! - `runtime` - logging, configuration and the event bus (`core-runtime`)
//! - `orchestrator` (default) - the scheduling core (`core-orchestrator`)
//!
//! The host-side contracts in `bridge-traits` are always available.

pub use bridge_traits as bridge;

#[cfg(feature = "runtime")]
pub use core_runtime as runtime;

#[cfg(feature = "orchestrator")]
pub use core_orchestrator as orchestrator;
