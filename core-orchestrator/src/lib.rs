//! # Core Orchestrator
//!
//! Decides which media sessions are prepared, playing, paused or released
//! as containers appear, scroll and disappear inside host lifecycle scopes.
//!
//! ## Overview
//!
//! - [`Master`] - Root registry and single control-thread entry point
//! - [`Group`] - Managers sharing one lifecycle root
//! - [`Manager`] - Per host binding set and scheduling plan
//! - [`Binding`] - Session mounted in a container, with its activation state
//! - [`PlaybackSession`] - Tag-addressed wrapper around a platform [`Bridge`](bridge_traits::Bridge)
//! - [`PlaybackInfoStore`] - Resume positions keyed by tag
//!
//! ## Usage
//!
//! ```ignore
//! use core_orchestrator::{BindingConfig, Master, Tag};
//! use core_runtime::config::{MemoryMode, OrchestratorConfig};
//!
//! let mut master = Master::new(OrchestratorConfig::default())?;
//! master.register_engine(engine);
//! master.register(RootId(1), host.clone(), MemoryMode::Auto);
//!
//! let session = master
//!     .set_up(Media::new("https://cdn.example/clip.mp4"))?
//!     .tag(Tag::new("feed:42"))
//!     .bind(ContainerRef::new(7, "PlayerView"))?;
//!
//! let control = master.control_handle();
//! control.container_attached(ContainerId(7), ContainerLayout::new(0, 1.0))?;
//! master.pump()?;
//! ```

pub mod binding;
pub mod control;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod group;
pub mod info_store;
pub mod manager;
pub mod master;
pub mod selection;
pub mod session;
pub mod types;

pub use binding::{
    Binding, BindingCallbacks, BindingConfig, BindingState, ControllerPolicy, Disposition,
    Retention, SurfaceStrategy,
};
pub use control::{ControlEvent, ControlHandle};
pub use dispatcher::{DeferredTask, Dispatcher};
pub use engine::{BindCallback, Binder, Engine, EngineFactory, DEFAULT_RENDERER_TYPE};
pub use error::{OrchestratorError, Result};
pub use group::Group;
pub use info_store::PlaybackInfoStore;
pub use manager::{Manager, PlanContext, PlanInput, PlanStep, FAR};
pub use master::Master;
pub use selection::{Candidate, ContainerLayout, MostVisible, Selection, SelectionPolicy};
pub use session::{Owner, PlaybackSession};
pub use types::{BindingId, GroupId, ManagerId, PlaybackIntent, SessionId, Tag};
