//! Host lifecycle and container contracts.
//!
//! A *host* is a lifecycle scope (a screen, a fragment, a window) that owns a
//! set of containers. Containers are the opaque slots a binding mounts its
//! surface into; the orchestrator only needs to compare them and ask which
//! host currently claims them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::platform::PlatformSendSync;

/// Identity of a container slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub u64);

impl From<u64> for ContainerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// Identity of a host (lifecycle scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(pub u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Identity of a top-level lifecycle root (an activity, a window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(pub u64);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Concrete container type, used to look up renderer providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerKind(pub String);

impl ContainerKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Container reference passed to `bind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub id: ContainerId,
    pub kind: ContainerKind,
}

impl ContainerRef {
    pub fn new(id: impl Into<ContainerId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ContainerKind::new(kind),
        }
    }
}

/// Ordered lifecycle events emitted by hosts and roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HostLifecycle {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
    /// Terminal: everything scoped to the host is torn down.
    Destroyed,
}

impl HostLifecycle {
    /// Returns `true` when playback may be issued for the host.
    pub fn is_foreground(&self) -> bool {
        matches!(self, HostLifecycle::Resumed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HostLifecycle::Destroyed)
    }
}

/// Lifecycle scope owning a set of containers.
///
/// # Platform Support
///
/// - **Android**: Activity / Fragment view lifecycle
/// - **iOS**: UIViewController appearance callbacks
/// - **Desktop / Web**: window or route visibility
///
/// Lifecycle transitions are not polled; the platform glue forwards them to
/// the orchestrator's control handle.
pub trait Host: PlatformSendSync {
    /// Stable identity, used to route lifecycle events.
    fn id(&self) -> HostId;

    /// Returns `true` if the container currently belongs to this host.
    fn claims(&self, container: &ContainerId) -> bool;

    /// Human readable label used in logs.
    fn name(&self) -> String {
        "host".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_foreground() {
        assert!(HostLifecycle::Resumed.is_foreground());
        assert!(!HostLifecycle::Started.is_foreground());
        assert!(!HostLifecycle::Paused.is_foreground());
        assert!(HostLifecycle::Destroyed.is_terminal());
        assert!(HostLifecycle::Created < HostLifecycle::Destroyed);
    }

    #[test]
    fn test_container_ref() {
        let a = ContainerRef::new(7, "FrameLayout");
        let b = ContainerRef::new(7u64, "FrameLayout");
        assert_eq!(a, b);
        assert_eq!(a.kind.as_str(), "FrameLayout");
        assert_eq!(a.id.to_string(), "container#7");
    }

    struct FixedHost;

    impl Host for FixedHost {
        fn id(&self) -> HostId {
            HostId(1)
        }

        fn claims(&self, container: &ContainerId) -> bool {
            container.0 < 10
        }
    }

    #[test]
    fn test_host_claims() {
        let host = FixedHost;
        assert!(host.claims(&ContainerId(3)));
        assert!(!host.claims(&ContainerId(42)));
        assert_eq!(host.name(), "host");
        assert_eq!(host.id().to_string(), "host#1");
    }
}
