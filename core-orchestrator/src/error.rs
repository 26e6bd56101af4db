//! # Orchestrator Error Types
//!
//! Errors raised by the binding resolver and the scheduler.

use bridge_traits::{BridgeError, RootId};
use thiserror::Error;

use crate::types::{BindingId, ManagerId, SessionId};

/// Errors that can occur while orchestrating playback.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    // ========================================================================
    // Programmer Errors
    // ========================================================================
    /// A structural invariant was broken by the caller (teardown of an owned
    /// session, a container no host claims). Never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// No engine registered (or creatable) for the renderer type.
    #[error("No engine available for renderer type: {0}")]
    EngineMissing(String),

    /// Invalid orchestrator configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Binding not found: {0}")]
    BindingNotFound(BindingId),

    #[error("Manager not found: {0}")]
    ManagerNotFound(ManagerId),

    #[error("No group registered for {0}")]
    GroupNotFound(RootId),

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// The control channel was closed before the event could be delivered.
    #[error("Control channel closed")]
    ControlChannelClosed,
}

impl OrchestratorError {
    /// Returns `true` for programmer errors that must not be swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::InvariantViolation(_))
    }

    /// Returns `true` if the operation may succeed when retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Bridge(BridgeError::RendererUnavailable(_))
                | OrchestratorError::Bridge(BridgeError::OperationFailed(_))
        )
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
