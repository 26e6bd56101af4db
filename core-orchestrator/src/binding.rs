//! # Bindings
//!
//! A binding is the live association between one session, one container and
//! the manager of the host that claims the container. It is the unit the
//! scheduler activates and deactivates.
//!
//! ## State machine
//!
//! ```text
//! Idle ──> Active <──> Inactive ──> Removed
//!   └───────────────────^
//! ```
//!
//! `Removed` is terminal. An idle binding may go straight to `Inactive` when
//! its first refresh keeps it unselected.
//!
//! ## Surfaces
//!
//! A binding either renders straight into its container
//! ([`SurfaceStrategy::Static`]) or borrows a renderer from the group's
//! provider for the container kind ([`SurfaceStrategy::Pooled`]).

use bridge_traits::{
    ContainerRef, Media, RendererContext, RendererHandle, RendererProvider,
};
use core_runtime::events::RetentionKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{BindingId, ManagerId, SessionId};

/// Variant label of renderers that are the container itself.
pub const STATIC_RENDERER_VARIANT: &str = "static";

/// What the client lets the scheduler do on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPolicy {
    /// May the scheduler start playback when the binding is selected.
    pub scheduler_can_start: bool,
    /// May the scheduler pause playback the client started.
    pub scheduler_can_pause: bool,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            scheduler_can_start: true,
            scheduler_can_pause: true,
        }
    }
}

/// Client hooks fired on binding transitions.
pub trait BindingCallbacks: Send + Sync {
    fn on_active(&self, _binding: BindingId) {}

    fn on_inactive(&self, _binding: BindingId) {}

    fn on_distance_changed(&self, _binding: BindingId, _from: u32, _to: u32) {}
}

/// Behavior configuration supplied with a bind request.
#[derive(Clone, Default)]
pub struct BindingConfig {
    /// Delay between activation and the bridge `play`.
    pub delay: Duration,
    pub controller: Option<ControllerPolicy>,
    pub callbacks: Option<Arc<dyn BindingCallbacks>>,
}

impl BindingConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_controller(mut self, controller: ControllerPolicy) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn BindingCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

impl fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingConfig")
            .field("delay", &self.delay)
            .field("controller", &self.controller)
            .field("has_callbacks", &self.callbacks.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingState {
    Idle,
    Active,
    Inactive,
    Removed,
}

impl BindingState {
    pub fn can_transition_to(self, next: BindingState) -> bool {
        use BindingState::*;
        matches!(
            (self, next),
            (Idle, Active)
                | (Idle, Inactive)
                | (Active, Inactive)
                | (Inactive, Active)
                | (Idle, Removed)
                | (Active, Removed)
                | (Inactive, Removed)
        )
    }
}

/// How an unselected binding keeps its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    /// Paused, player kept prepared.
    Pause,
    /// Paused and reset.
    Reset,
    /// Released after the grace window.
    Release,
}

impl From<Retention> for RetentionKind {
    fn from(value: Retention) -> Self {
        match value {
            Retention::Pause => RetentionKind::Paused,
            Retention::Reset => RetentionKind::Reset,
            Retention::Release => RetentionKind::Released,
        }
    }
}

/// Outcome the scheduler planned for a binding on one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Activate { play: bool },
    Deactivate(Retention),
}

/// How a binding obtains its renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceStrategy {
    /// The container is the renderer.
    Static,
    /// A renderer is borrowed from the group's provider per activation.
    Pooled,
}

impl SurfaceStrategy {
    /// Obtain a renderer for an activation.
    pub fn acquire_renderer(
        &self,
        provider: Option<&Arc<dyn RendererProvider>>,
        container: &ContainerRef,
        media: &Media,
    ) -> bridge_traits::error::Result<RendererHandle> {
        match self {
            SurfaceStrategy::Static => Ok(RendererHandle::new(
                container.id.0,
                STATIC_RENDERER_VARIANT,
            )),
            SurfaceStrategy::Pooled => {
                let provider = provider.ok_or_else(|| {
                    bridge_traits::BridgeError::RendererUnavailable(format!(
                        "no provider for {}",
                        container.kind.as_str()
                    ))
                })?;
                let variant = provider.select_variant(media);
                let context = RendererContext {
                    container: container.id,
                    media: media.clone(),
                };
                provider.create_renderer(&context, &variant)
            }
        }
    }

    /// Return a renderer after deactivation or removal.
    pub fn release_renderer(
        &self,
        provider: Option<&Arc<dyn RendererProvider>>,
        renderer: RendererHandle,
    ) {
        if let (SurfaceStrategy::Pooled, Some(provider)) = (self, provider) {
            provider.release_renderer(renderer);
        }
    }
}

#[derive(Debug)]
pub struct Binding {
    id: BindingId,
    session: SessionId,
    manager: ManagerId,
    container: ContainerRef,
    config: BindingConfig,
    strategy: SurfaceStrategy,
    pub(crate) state: BindingState,
    pub(crate) renderer: Option<RendererHandle>,
    pub(crate) playing: bool,
    pub(crate) distance: Option<u32>,
    pub(crate) disposition: Option<Disposition>,
}

impl Binding {
    pub(crate) fn new(
        session: SessionId,
        manager: ManagerId,
        container: ContainerRef,
        config: BindingConfig,
        strategy: SurfaceStrategy,
    ) -> Self {
        Self {
            id: BindingId::new(),
            session,
            manager,
            container,
            config,
            strategy,
            state: BindingState::Idle,
            renderer: None,
            playing: false,
            distance: None,
            disposition: None,
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn manager(&self) -> ManagerId {
        self.manager
    }

    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn strategy(&self) -> SurfaceStrategy {
        self.strategy
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn renderer(&self) -> Option<&RendererHandle> {
        self.renderer.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Distance from the selection computed on the last refresh.
    pub fn distance(&self) -> Option<u32> {
        self.distance
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.disposition
    }

    /// Move to `next` if the state machine allows it.
    pub(crate) fn transition(&mut self, next: BindingState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                binding = %self.id,
                from = ?self.state,
                to = ?next,
                "Rejected binding transition"
            );
            return false;
        }
        self.state = next;
        true
    }
}
