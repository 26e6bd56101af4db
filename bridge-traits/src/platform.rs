//! Thread-safety marker traits shared by every bridge contract.
//!
//! The orchestrator mutates its state on a single control thread, but the
//! collaborators it holds (hosts, renderer providers, memory monitors) are
//! shared with platform callbacks that may live on other threads. These
//! helpers keep the bounds in one place.

/// Marker trait equivalent to `Send + Sync`.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait equivalent to `Send`.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
