//! # Event Bus System
//!
//! Broadcasts orchestration decisions using `tokio::sync::broadcast` so hosts
//! (debug overlays, analytics, tests) can observe the scheduler without
//! reaching into its state.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps three families: binding events
//!   (created, removed, activated, deactivated, playing, paused), session
//!   events (prepared, released, torn down, errors) and lifecycle events
//!   (groups and managers coming and going).
//! - **EventBus**: central broadcast channel.
//! - **EventStream**: receiver wrapper with optional filtering.
//!
//! ```text
//! ┌──────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │  Master  ├─────────>│ EventBus  ├────────────>│ Subscriber │
//! └──────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BindingEvent, CoreEvent, EventBus};
//!
//! let bus = EventBus::new(16);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(CoreEvent::Binding(BindingEvent::Activated {
//!     binding_id: "b-1".to_string(),
//!     session_id: "s-1".to_string(),
//! }))
//! .ok();
//!
//! assert!(receiver.try_recv().is_ok());
//! ```
//!
//! Emitting without subscribers returns an error, which the orchestrator
//! ignores: observation is optional.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Binding(BindingEvent),
    Session(SessionEvent),
    Lifecycle(LifecycleEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Binding(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Lifecycle(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Binding(BindingEvent::Created { .. })
            | CoreEvent::Binding(BindingEvent::Removed { .. })
            | CoreEvent::Lifecycle(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Binding Events
// ============================================================================

/// How a deactivated binding keeps its session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RetentionKind {
    /// Paused, player kept warm.
    Paused,
    /// Paused and reset, player instance kept.
    Reset,
    /// Player released after the grace window.
    Released,
}

/// Events describing binding creation and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BindingEvent {
    /// The resolver created a binding.
    Created {
        binding_id: String,
        session_id: String,
        container: u64,
        manager_id: String,
    },
    /// A binding was removed from its manager.
    Removed { binding_id: String, session_id: String },
    /// Renderer attached and session prepared.
    Activated { binding_id: String, session_id: String },
    /// Binding left the active set.
    Deactivated {
        binding_id: String,
        session_id: String,
        retention: RetentionKind,
    },
    /// Distance from the selection changed.
    DistanceChanged {
        binding_id: String,
        from: u32,
        to: u32,
    },
    Playing { binding_id: String },
    Paused { binding_id: String },
}

impl BindingEvent {
    fn description(&self) -> &str {
        match self {
            BindingEvent::Created { .. } => "Binding created",
            BindingEvent::Removed { .. } => "Binding removed",
            BindingEvent::Activated { .. } => "Binding activated",
            BindingEvent::Deactivated { .. } => "Binding deactivated",
            BindingEvent::DistanceChanged { .. } => "Binding distance changed",
            BindingEvent::Playing { .. } => "Binding started playing",
            BindingEvent::Paused { .. } => "Binding paused",
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Events describing the bridge lifecycle of sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    Prepared { session_id: String },
    Released { session_id: String },
    TornDown { session_id: String, cleared_state: bool },
    /// Saved position applied before preparation.
    Restored { session_id: String, position_ms: u64 },
    Error { session_id: String, message: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Prepared { .. } => "Session prepared",
            SessionEvent::Released { .. } => "Session released",
            SessionEvent::TornDown { .. } => "Session torn down",
            SessionEvent::Restored { .. } => "Session playback info restored",
            SessionEvent::Error { .. } => "Session error",
        }
    }
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Events describing groups and managers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    GroupCreated { group_id: String },
    GroupDestroyed { group_id: String },
    ManagerRegistered { manager_id: String, group_id: String },
    ManagerDestroyed { manager_id: String },
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::GroupCreated { .. } => "Group created",
            LifecycleEvent::GroupDestroyed { .. } => "Group destroyed",
            LifecycleEvent::ManagerRegistered { .. } => "Manager registered",
            LifecycleEvent::ManagerDestroyed { .. } => "Manager destroyed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an
/// independent receiver. Slow subscribers get `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drain every event currently buffered that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
