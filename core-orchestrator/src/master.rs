//! # Master
//!
//! Root orchestrator. Owns every group, manager, binding and session, the
//! playback info store and the engine registry, and is the single entry
//! point for "bind session X to container Y".
//!
//! ## Control model
//!
//! All state is mutated on the thread that owns the `Master`. Platform
//! callbacks send [`ControlEvent`]s through a [`ControlHandle`]; the host
//! calls [`Master::pump`] from its main loop to apply them:
//!
//! 1. drain control events (attach/detach/layout, lifecycle, bridge state)
//! 2. run deferred work that is due according to the injected clock
//! 3. refresh every manager marked dirty, once each
//!
//! ## Binding resolution
//!
//! | bound to container | bound to session | action |
//! |--------------------|------------------|--------|
//! | none               | none             | create |
//! | none               | B                | create, remove B |
//! | A                  | none             | create, remove A |
//! | A                  | A                | no-op |
//! | A                  | B                | create, remove A and B |
//!
//! Removing a binding whose session already moved to a new binding only
//! detaches its renderer, so the session keeps playing from where it was.

use bridge_traits::{
    ContainerId, ContainerKind, ContainerRef, Host, HostId, HostLifecycle, Media,
    RendererProvider, RootId,
};
use core_runtime::config::{MemoryMode, OrchestratorConfig};
use core_runtime::events::{
    BindingEvent, CoreEvent, EventBus, LifecycleEvent, Receiver, SessionEvent,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::binding::{
    Binding, BindingConfig, BindingState, ControllerPolicy, Disposition, Retention,
    SurfaceStrategy,
};
use crate::control::{ControlEvent, ControlHandle};
use crate::dispatcher::{DeferredTask, Dispatcher};
use crate::engine::{BindCallback, Binder, Engine, EngineFactory, DEFAULT_RENDERER_TYPE};
use crate::error::{OrchestratorError, Result};
use crate::group::Group;
use crate::info_store::PlaybackInfoStore;
use crate::manager::{Manager, PlanContext, PlanInput, PlanStep};
use crate::selection::{ContainerLayout, MostVisible, SelectionPolicy};
use crate::session::{Owner, PlaybackSession};
use crate::types::{BindingId, ManagerId, PlaybackIntent, SessionId, Tag};

struct PendingBindRequest {
    session: SessionId,
    container: ContainerRef,
    config: BindingConfig,
    callback: Option<BindCallback>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ContainerStatus {
    attached: bool,
    layout: Option<ContainerLayout>,
}

pub struct Master {
    config: OrchestratorConfig,
    events: EventBus,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    selection: Box<dyn SelectionPolicy>,
    engines: HashMap<String, Arc<dyn Engine>>,
    engine_factory: Option<EngineFactory>,
    /// Creation order.
    groups: Vec<Group>,
    managers: HashMap<ManagerId, Manager>,
    bindings: HashMap<BindingId, Binding>,
    sessions: HashMap<SessionId, PlaybackSession>,
    container_index: HashMap<ContainerId, BindingId>,
    containers: HashMap<ContainerId, ContainerStatus>,
    pending: HashMap<ContainerId, PendingBindRequest>,
    info_store: PlaybackInfoStore,
    intents: HashMap<Tag, PlaybackIntent>,
    client_started: HashSet<Tag>,
    dispatcher: Dispatcher,
    dirty: Vec<ManagerId>,
}

impl Master {
    /// Create a master with the default [`MostVisible`] selection policy.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if the configuration is invalid.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let events = EventBus::new(config.event_buffer_size);

        Ok(Self {
            config,
            events,
            control_tx,
            control_rx,
            selection: Box::new(MostVisible),
            engines: HashMap::new(),
            engine_factory: None,
            groups: Vec::new(),
            managers: HashMap::new(),
            bindings: HashMap::new(),
            sessions: HashMap::new(),
            container_index: HashMap::new(),
            containers: HashMap::new(),
            pending: HashMap::new(),
            info_store: PlaybackInfoStore::new(),
            intents: HashMap::new(),
            client_started: HashSet::new(),
            dispatcher: Dispatcher::new(),
            dirty: Vec::new(),
        })
    }

    pub fn with_selection_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.selection = Box::new(policy);
        self
    }

    /// Factory consulted when no engine is registered for a renderer type.
    pub fn with_engine_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<dyn Engine>> + Send + Sync + 'static,
    {
        self.engine_factory = Some(Box::new(factory));
        self
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle::new(self.control_tx.clone())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Engines and set up
    // ------------------------------------------------------------------------

    pub fn register_engine(&mut self, engine: Arc<dyn Engine>) {
        self.engines
            .insert(engine.renderer_type().to_string(), engine);
    }

    pub fn unregister_engine(&mut self, renderer_type: &str) -> Option<Arc<dyn Engine>> {
        self.engines.remove(renderer_type)
    }

    pub fn set_up(&mut self, media: Media) -> Result<Binder<'_>> {
        self.set_up_for(DEFAULT_RENDERER_TYPE, media)
    }

    /// Start a bind request for media rendered by `renderer_type`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::EngineMissing`] when no engine is registered and
    /// the engine factory (if any) cannot create one.
    pub fn set_up_for(&mut self, renderer_type: &str, media: Media) -> Result<Binder<'_>> {
        let engine = self.engine_for(renderer_type)?;
        Ok(Binder::new(self, engine, media))
    }

    fn engine_for(&mut self, renderer_type: &str) -> Result<Arc<dyn Engine>> {
        if let Some(engine) = self.engines.get(renderer_type) {
            return Ok(Arc::clone(engine));
        }

        let engine = self
            .engine_factory
            .as_ref()
            .and_then(|factory| factory(renderer_type))
            .ok_or_else(|| OrchestratorError::EngineMissing(renderer_type.to_string()))?;

        debug!(renderer_type, "Created engine lazily");
        self.engines
            .insert(renderer_type.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Reuse the session holding `tag`, or create one through `engine`.
    pub(crate) fn session_for(
        &mut self,
        engine: &dyn Engine,
        media: Media,
        tag: Tag,
    ) -> Result<SessionId> {
        if !tag.is_sentinel() {
            if let Some(existing) = self.sessions.values().find(|session| *session.tag() == tag) {
                debug!(session = %existing.id(), tag = %tag, "Reusing session for tag");
                return Ok(existing.id());
            }
        }

        let bridge = engine.create_bridge(&media)?;
        let session = PlaybackSession::new(media, tag, engine.renderer_type(), bridge);
        let session_id = session.id();
        debug!(session = %session_id, tag = %session.tag(), "Session created");
        self.sessions.insert(session_id, session);
        Ok(session_id)
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register `host` under `root`, creating the group and manager lazily.
    ///
    /// Without an explicit memory mode the configured default applies.
    /// Registering the same host twice returns the existing manager.
    #[instrument(
        skip(self, host, memory_mode),
        fields(root = %root, host = %host.id(), name = %host.name())
    )]
    pub fn register(
        &mut self,
        root: RootId,
        host: Arc<dyn Host>,
        memory_mode: impl Into<Option<MemoryMode>>,
    ) -> ManagerId {
        let memory_mode = memory_mode
            .into()
            .unwrap_or(self.config.default_memory_mode);
        let group_index = match self.groups.iter().position(|group| group.root() == root) {
            Some(index) => index,
            None => {
                let group = Group::new(root);
                info!(group = %group.id(), "Group created");
                self.emit(CoreEvent::Lifecycle(LifecycleEvent::GroupCreated {
                    group_id: group.id().to_string(),
                }));
                self.groups.push(group);
                self.schedule_startup();
                self.groups.len() - 1
            }
        };

        let host_id = host.id();
        let existing = self.groups[group_index]
            .managers()
            .iter()
            .copied()
            .find(|id| self.managers.get(id).map(Manager::host_id) == Some(host_id));
        if let Some(manager_id) = existing {
            return manager_id;
        }

        let group_id = self.groups[group_index].id();
        let manager = Manager::new(group_id, host, memory_mode);
        let manager_id = manager.id();
        self.managers.insert(manager_id, manager);
        self.groups[group_index].add_manager(manager_id);

        info!(manager = %manager_id, mode = ?memory_mode, "Manager registered");
        self.emit(CoreEvent::Lifecycle(LifecycleEvent::ManagerRegistered {
            manager_id: manager_id.to_string(),
            group_id: group_id.to_string(),
        }));
        self.mark_dirty(manager_id);
        manager_id
    }

    pub fn register_renderer_provider(
        &mut self,
        root: RootId,
        kind: ContainerKind,
        provider: Arc<dyn RendererProvider>,
    ) -> Result<()> {
        let group = self
            .groups
            .iter_mut()
            .find(|group| group.root() == root)
            .ok_or(OrchestratorError::GroupNotFound(root))?;
        debug!(group = %group.id(), kind = kind.as_str(), "Renderer provider registered");
        group.register_provider(kind, provider);
        Ok(())
    }

    pub fn set_memory_mode(&mut self, manager_id: ManagerId, mode: MemoryMode) -> Result<()> {
        let manager = self
            .managers
            .get_mut(&manager_id)
            .ok_or(OrchestratorError::ManagerNotFound(manager_id))?;
        manager.memory_mode = mode;
        self.mark_dirty(manager_id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    /// Record a bind request for `container`.
    ///
    /// The request replaces any earlier one for the same container and
    /// resolves immediately when the container is attached.
    pub fn bind(
        &mut self,
        session_id: SessionId,
        container: ContainerRef,
        config: BindingConfig,
        callback: Option<BindCallback>,
    ) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;
        if session.owner == Owner::None {
            session.owner = Owner::Provisional;
        }

        let container_id = container.id;
        let request = PendingBindRequest {
            session: session_id,
            container,
            config,
            callback,
        };
        if let Some(superseded) = self.pending.insert(container_id, request) {
            debug!(
                container = %container_id,
                session = %superseded.session,
                "Superseded pending bind request"
            );
            self.drop_orphan(superseded.session)?;
        }

        if self.is_attached(&container_id) {
            if let Some(request) = self.pending.remove(&container_id) {
                self.resolve(request)?;
            }
        }
        Ok(())
    }

    fn resolve(&mut self, request: PendingBindRequest) -> Result<()> {
        let PendingBindRequest {
            session: session_id,
            container,
            config,
            callback,
        } = request;

        let Some(session) = self.sessions.get(&session_id) else {
            debug!(session = %session_id, "Dropping bind request for missing session");
            return Ok(());
        };

        let manager_id = self.manager_for_container(&container.id).ok_or_else(|| {
            OrchestratorError::InvariantViolation(format!(
                "no registered host claims {}",
                container.id
            ))
        })?;

        let for_container = self.container_index.get(&container.id).copied();
        let for_session = session.binding();

        if let (Some(existing), Some(current)) = (for_container, for_session) {
            if existing == current {
                debug!(binding = %existing, "Binding already in place");
                if let Some(callback) = callback {
                    callback(existing);
                }
                return Ok(());
            }
        }

        let strategy = match self.group_of(manager_id) {
            Some(group) if group.has_provider(&container.kind) => SurfaceStrategy::Pooled,
            _ => SurfaceStrategy::Static,
        };
        let binding = Binding::new(session_id, manager_id, container.clone(), config, strategy);
        let binding_id = binding.id();

        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.binding = Some(binding_id);
            session.owner = Owner::Manager(manager_id);
        }
        self.bindings.insert(binding_id, binding);
        self.container_index.insert(container.id, binding_id);
        if let Some(manager) = self.managers.get_mut(&manager_id) {
            manager.bindings.insert(container.id, binding_id);
        }

        info!(
            binding = %binding_id,
            session = %session_id,
            container = %container.id,
            manager = %manager_id,
            strategy = ?strategy,
            "Binding created"
        );
        self.emit(CoreEvent::Binding(BindingEvent::Created {
            binding_id: binding_id.to_string(),
            session_id: session_id.to_string(),
            container: container.id.0,
            manager_id: manager_id.to_string(),
        }));

        for stale in [for_container, for_session].into_iter().flatten() {
            self.remove_binding(stale)?;
        }

        self.mark_dirty(manager_id);
        if let Some(callback) = callback {
            callback(binding_id);
        }
        Ok(())
    }

    /// First manager, groups in creation order then managers in registration
    /// order, whose host claims the container.
    fn manager_for_container(&self, container: &ContainerId) -> Option<ManagerId> {
        self.groups
            .iter()
            .flat_map(|group| group.managers().iter())
            .copied()
            .find(|id| {
                self.managers
                    .get(id)
                    .is_some_and(|manager| manager.claims(container))
            })
    }

    fn remove_binding(&mut self, binding_id: BindingId) -> Result<()> {
        let Some(mut binding) = self.bindings.remove(&binding_id) else {
            return Ok(());
        };
        let container_id = binding.container().id;
        let manager_id = binding.manager();
        let session_id = binding.session();

        if self.container_index.get(&container_id) == Some(&binding_id) {
            self.container_index.remove(&container_id);
        }
        let mut unstuck_group = None;
        if let Some(manager) = self.managers.get_mut(&manager_id) {
            if manager.bindings.get(&container_id) == Some(&binding_id) {
                manager.bindings.remove(&container_id);
            }
            if manager.sticky == Some(binding_id) {
                manager.sticky = None;
                unstuck_group = Some(manager.group());
            }
        }
        if let Some(group_id) = unstuck_group {
            if let Some(group) = self.groups.iter_mut().find(|group| group.id() == group_id) {
                group.unstick(manager_id);
            }
        }

        self.dispatcher
            .cancel(&DeferredTask::DelayedStart(binding_id));

        if let Some(renderer) = binding.renderer.take() {
            let provider = self.provider_for(manager_id, &binding.container().kind);
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.detach_renderer();
            }
            binding
                .strategy()
                .release_renderer(provider.as_ref(), renderer);
        }
        binding.transition(BindingState::Removed);
        self.mark_dirty(manager_id);

        debug!(binding = %binding_id, session = %session_id, "Binding removed");
        self.emit(CoreEvent::Binding(BindingEvent::Removed {
            binding_id: binding_id.to_string(),
            session_id: session_id.to_string(),
        }));

        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Ok(());
        };
        if session.binding != Some(binding_id) {
            // Session moved to another binding, keep its bridge untouched.
            return Ok(());
        }

        session.binding = None;
        session.owner = Owner::None;
        self.save_playback_info(session_id);

        if self.pending_references(session_id) {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.owner = Owner::Provisional;
            }
            Ok(())
        } else {
            self.tear_down(session_id, false)
        }
    }

    /// Tear down a superseded request's session nobody else wants.
    fn drop_orphan(&mut self, session_id: SessionId) -> Result<()> {
        let orphaned = self.sessions.get(&session_id).is_some_and(|session| {
            session.owner() == Owner::Provisional && session.binding().is_none()
        }) && !self.pending_references(session_id);

        if orphaned {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.owner = Owner::None;
            }
            self.tear_down(session_id, false)?;
        }
        Ok(())
    }

    fn pending_references(&self, session_id: SessionId) -> bool {
        self.pending
            .values()
            .any(|request| request.session == session_id)
    }

    // ------------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------------

    /// Release a session's bridge and drop it from the registry.
    ///
    /// With `clear_state` the saved position, pending intent and
    /// client-started mark for its tag are purged too.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvariantViolation`] if the session still has an
    /// owner or a binding.
    pub fn tear_down(&mut self, session_id: SessionId, clear_state: bool) -> Result<()> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;
        if session.owner() != Owner::None {
            return Err(OrchestratorError::InvariantViolation(format!(
                "tear down of session {} owned by {:?}",
                session_id,
                session.owner()
            )));
        }
        if let Some(binding) = session.binding() {
            return Err(OrchestratorError::InvariantViolation(format!(
                "tear down of session {} still bound to {}",
                session_id, binding
            )));
        }

        self.dispatcher
            .cancel(&DeferredTask::ReleaseSession(session_id));
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return Ok(());
        };
        session.pause();
        session.release();

        if clear_state && !session.tag().is_sentinel() {
            self.info_store.remove(session.tag());
            self.intents.remove(session.tag());
            self.client_started.remove(session.tag());
        }

        info!(session = %session_id, clear_state, "Session torn down");
        self.emit(CoreEvent::Session(SessionEvent::TornDown {
            session_id: session_id.to_string(),
            cleared_state: clear_state,
        }));
        Ok(())
    }

    /// Save the session's position unless its tag already has a snapshot.
    pub fn try_save_playback_info(&mut self, session_id: SessionId) -> Result<bool> {
        if !self.sessions.contains_key(&session_id) {
            return Err(OrchestratorError::SessionNotFound(session_id));
        }
        Ok(self.save_playback_info(session_id))
    }

    fn save_playback_info(&mut self, session_id: SessionId) -> bool {
        let Some(session) = self.sessions.get(&session_id) else {
            return false;
        };
        let saved = self
            .info_store
            .try_save(session.tag(), session.playback_info());
        if saved {
            debug!(session = %session_id, tag = %session.tag(), "Playback info saved");
        }
        saved
    }

    /// Apply and consume the saved position for the session's tag.
    ///
    /// The snapshot is consumed even when the player is past `Idle`, in which
    /// case it is discarded.
    pub fn try_restore_playback_info(&mut self, session_id: SessionId) -> Result<bool> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;
        let Some(info) = self.info_store.take(session.tag()) else {
            return Ok(false);
        };
        if !session.is_idle() {
            debug!(
                session = %session_id,
                state = ?session.player_state(),
                reported = ?session.reported_state(),
                "Restore skipped"
            );
            return Ok(false);
        }

        session.set_playback_info(info);
        debug!(session = %session_id, position = ?info.resume_position, "Playback info restored");
        self.emit(CoreEvent::Session(SessionEvent::Restored {
            session_id: session_id.to_string(),
            position_ms: u64::try_from(info.resume_position.as_millis()).unwrap_or(u64::MAX),
        }));
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Client controls
    // ------------------------------------------------------------------------

    /// Client request to play. Ignored unless the session is bound with a
    /// controller and carries a real tag.
    pub fn play(&mut self, session_id: SessionId) -> Result<()> {
        let Some((tag, controller, manager_id)) = self.controlled(session_id)? else {
            debug!(session = %session_id, "Play ignored, session not controlled");
            return Ok(());
        };
        if !controller.scheduler_can_pause {
            self.client_started.insert(tag.clone());
        }
        self.intents.insert(tag, PlaybackIntent::Play);
        self.mark_dirty(manager_id);
        Ok(())
    }

    /// Client request to pause. Same preconditions as [`Master::play`].
    pub fn pause(&mut self, session_id: SessionId) -> Result<()> {
        let Some((tag, _, manager_id)) = self.controlled(session_id)? else {
            debug!(session = %session_id, "Pause ignored, session not controlled");
            return Ok(());
        };
        self.client_started.remove(&tag);
        self.intents.insert(tag, PlaybackIntent::Pause);
        self.mark_dirty(manager_id);
        Ok(())
    }

    fn controlled(
        &self,
        session_id: SessionId,
    ) -> Result<Option<(Tag, ControllerPolicy, ManagerId)>> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;
        if session.tag().is_sentinel() {
            return Ok(None);
        }
        let binding = session
            .binding()
            .and_then(|binding_id| self.bindings.get(&binding_id));
        Ok(binding.and_then(|binding| {
            binding
                .config()
                .controller
                .map(|controller| (session.tag().clone(), controller, binding.manager()))
        }))
    }

    /// Pin a binding: distance 0 until unstuck, other managers of its group
    /// stop selecting.
    pub fn stick(&mut self, binding_id: BindingId) -> Result<()> {
        let manager_id = self
            .bindings
            .get(&binding_id)
            .ok_or(OrchestratorError::BindingNotFound(binding_id))?
            .manager();
        let manager = self
            .managers
            .get_mut(&manager_id)
            .ok_or(OrchestratorError::ManagerNotFound(manager_id))?;
        manager.sticky = Some(binding_id);
        let group_id = manager.group();

        let mut affected = vec![manager_id];
        if let Some(group) = self.groups.iter_mut().find(|group| group.id() == group_id) {
            group.stick(manager_id);
            affected.extend_from_slice(group.managers());
        }
        debug!(binding = %binding_id, manager = %manager_id, "Binding stuck");
        for id in affected {
            self.mark_dirty(id);
        }
        Ok(())
    }

    pub fn unstick(&mut self, binding_id: BindingId) -> Result<()> {
        let manager_id = self
            .bindings
            .get(&binding_id)
            .ok_or(OrchestratorError::BindingNotFound(binding_id))?
            .manager();
        let manager = self
            .managers
            .get_mut(&manager_id)
            .ok_or(OrchestratorError::ManagerNotFound(manager_id))?;
        if manager.sticky == Some(binding_id) {
            manager.sticky = None;
        }
        let group_id = manager.group();

        let mut affected = vec![manager_id];
        if let Some(group) = self.groups.iter_mut().find(|group| group.id() == group_id) {
            group.unstick(manager_id);
            affected.extend_from_slice(group.managers());
        }
        debug!(binding = %binding_id, manager = %manager_id, "Binding unstuck");
        for id in affected {
            self.mark_dirty(id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Control loop
    // ------------------------------------------------------------------------

    /// Apply queued control events, run due deferred work, then refresh
    /// dirty managers.
    ///
    /// Work scheduled during a pass (a zero grace window, a start delay)
    /// runs on a later pass.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error; events and due tasks not yet applied
    /// stay queued.
    pub fn pump(&mut self) -> Result<()> {
        while let Ok(event) = self.control_rx.try_recv() {
            self.handle_event(event)?;
        }

        let now = self.now_millis();
        let watermark = self.dispatcher.watermark();
        while let Some(task) = self.dispatcher.pop_due(now, watermark) {
            self.run_task(task)?;
        }

        self.flush()
    }

    /// Clock time at which the next deferred task becomes due.
    pub fn next_due_millis(&self) -> Option<i64> {
        self.dispatcher.next_due()
    }

    fn handle_event(&mut self, event: ControlEvent) -> Result<()> {
        match event {
            ControlEvent::ContainerAttached { container, layout } => {
                let status = self.containers.entry(container).or_default();
                status.attached = true;
                status.layout = Some(layout);
                debug!(container = %container, ordinal = layout.ordinal, "Container attached");

                if let Some(request) = self.pending.remove(&container) {
                    self.resolve(request)?;
                }
                self.mark_container_dirty(&container);
            }
            ControlEvent::ContainerDetached { container } => {
                self.containers.entry(container).or_default().attached = false;
                debug!(container = %container, "Container detached");
                self.mark_container_dirty(&container);
            }
            ControlEvent::ContainerLayout { container, layout } => {
                self.containers.entry(container).or_default().layout = Some(layout);
                self.mark_container_dirty(&container);
            }
            ControlEvent::HostLifecycle { host, state } => {
                self.on_host_lifecycle(host, state)?;
            }
            ControlEvent::RootLifecycle { root, state } => {
                if state.is_terminal() {
                    self.destroy_group(root)?;
                } else {
                    debug!(root = %root, state = ?state, "Root lifecycle");
                }
            }
            ControlEvent::BridgeState { session, state } => {
                let Some(entry) = self.sessions.get_mut(&session) else {
                    return Ok(());
                };
                entry.report_state(state);
                let manager = entry
                    .binding()
                    .and_then(|binding| self.bindings.get(&binding))
                    .map(Binding::manager);
                if let Some(manager) = manager {
                    self.mark_dirty(manager);
                }
            }
        }
        Ok(())
    }

    fn on_host_lifecycle(&mut self, host: HostId, state: HostLifecycle) -> Result<()> {
        let targets: Vec<ManagerId> = self
            .managers
            .values()
            .filter(|manager| manager.host_id() == host)
            .map(Manager::id)
            .collect();
        if targets.is_empty() {
            debug!(host = %host, state = ?state, "Lifecycle for unregistered host");
            return Ok(());
        }

        for manager_id in targets {
            if state.is_terminal() {
                self.destroy_manager(manager_id)?;
                continue;
            }
            if let Some(manager) = self.managers.get_mut(&manager_id) {
                debug!(manager = %manager_id, from = ?manager.lifecycle, to = ?state, "Host lifecycle");
                manager.lifecycle = state;
            }
            self.mark_dirty(manager_id);
        }
        Ok(())
    }

    fn destroy_manager(&mut self, manager_id: ManagerId) -> Result<()> {
        let Some(manager) = self.managers.get(&manager_id) else {
            return Ok(());
        };
        let bindings: Vec<BindingId> = manager.bindings().collect();
        let group_id = manager.group();

        for binding_id in bindings {
            self.remove_binding(binding_id)?;
        }
        self.dispatcher.cancel_scope(manager_id);
        self.managers.remove(&manager_id);
        self.dirty.retain(|id| *id != manager_id);

        let mut siblings = Vec::new();
        if let Some(group) = self.groups.iter_mut().find(|group| group.id() == group_id) {
            group.remove_manager(manager_id);
            siblings.extend_from_slice(group.managers());
        }
        for sibling in siblings {
            self.mark_dirty(sibling);
        }

        info!(manager = %manager_id, "Manager destroyed");
        self.emit(CoreEvent::Lifecycle(LifecycleEvent::ManagerDestroyed {
            manager_id: manager_id.to_string(),
        }));
        Ok(())
    }

    fn destroy_group(&mut self, root: RootId) -> Result<()> {
        let Some(group) = self.groups.iter().find(|group| group.root() == root) else {
            debug!(root = %root, "Destroy for unknown root");
            return Ok(());
        };
        let group_id = group.id();
        let managers = group.managers().to_vec();

        let doomed: Vec<ContainerId> = self
            .pending
            .keys()
            .copied()
            .filter(|container| {
                managers.iter().any(|id| {
                    self.managers
                        .get(id)
                        .is_some_and(|manager| manager.claims(container))
                })
            })
            .collect();

        for manager_id in managers {
            self.destroy_manager(manager_id)?;
        }

        for container in doomed {
            let Some(request) = self.pending.remove(&container) else {
                continue;
            };
            let unbound = self
                .sessions
                .get(&request.session)
                .is_some_and(|session| session.binding().is_none());
            if !unbound || self.pending_references(request.session) {
                continue;
            }
            if let Some(session) = self.sessions.get_mut(&request.session) {
                session.owner = Owner::None;
            }
            self.tear_down(request.session, true)?;
        }

        self.groups.retain(|group| group.id() != group_id);
        info!(group = %group_id, root = %root, "Group destroyed");
        self.emit(CoreEvent::Lifecycle(LifecycleEvent::GroupDestroyed {
            group_id: group_id.to_string(),
        }));

        if self.groups.is_empty() {
            self.dispatcher.cancel(&DeferredTask::Startup);
        }
        Ok(())
    }

    fn run_task(&mut self, task: DeferredTask) -> Result<()> {
        match task {
            DeferredTask::Startup => self.startup(),
            DeferredTask::ReleaseSession(session_id) => {
                if !self.sessions.contains_key(&session_id) {
                    return Ok(());
                }
                self.save_playback_info(session_id);
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.release();
                }
                debug!(session = %session_id, "Session released");
                self.emit(CoreEvent::Session(SessionEvent::Released {
                    session_id: session_id.to_string(),
                }));
                Ok(())
            }
            DeferredTask::DelayedStart(binding_id) => {
                let ready = self.bindings.get(&binding_id).is_some_and(|binding| {
                    binding.state() == BindingState::Active
                        && binding.disposition() == Some(Disposition::Activate { play: true })
                        && self.is_attached(&binding.container().id)
                        && self
                            .managers
                            .get(&binding.manager())
                            .is_some_and(|manager| manager.lifecycle().is_foreground())
                });
                if ready {
                    self.play_now(binding_id);
                }
                Ok(())
            }
        }
    }

    /// Sweep provisional sessions nobody will bind, then refresh everything.
    fn startup(&mut self) -> Result<()> {
        let orphans: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| {
                session.owner() == Owner::Provisional
                    && session.binding().is_none()
                    && !self.pending_references(session.id())
            })
            .map(PlaybackSession::id)
            .collect();

        for session_id in orphans {
            debug!(session = %session_id, "Sweeping orphaned session");
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.owner = Owner::None;
            }
            self.tear_down(session_id, true)?;
        }

        let managers: Vec<ManagerId> = self
            .groups
            .iter()
            .flat_map(|group| group.managers().iter().copied())
            .collect();
        for manager_id in managers {
            self.mark_dirty(manager_id);
        }
        Ok(())
    }

    fn schedule_startup(&mut self) {
        let due = self.now_millis() + duration_millis(self.config.startup_delay);
        self.dispatcher.schedule(DeferredTask::Startup, due, None);
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    fn mark_dirty(&mut self, manager_id: ManagerId) {
        if !self.dirty.contains(&manager_id) {
            self.dirty.push(manager_id);
        }
    }

    fn mark_container_dirty(&mut self, container: &ContainerId) {
        let manager = self
            .container_index
            .get(container)
            .and_then(|binding| self.bindings.get(binding))
            .map(Binding::manager);
        if let Some(manager) = manager {
            self.mark_dirty(manager);
        }
    }

    fn flush(&mut self) -> Result<()> {
        for manager_id in std::mem::take(&mut self.dirty) {
            self.refresh(manager_id)?;
        }
        Ok(())
    }

    fn refresh(&mut self, manager_id: ManagerId) -> Result<()> {
        let Some(manager) = self.managers.get(&manager_id) else {
            return Ok(());
        };

        let selection_suppressed = self
            .groups
            .iter()
            .find(|group| group.id() == manager.group())
            .is_some_and(|group| group.suppresses(manager_id));
        let mode = match manager.memory_mode() {
            MemoryMode::Auto => MemoryMode::Auto.resolve(self.config.low_memory()),
            other => other,
        };
        let context = PlanContext {
            mode,
            host_state: manager.lifecycle(),
            high_mode_reset_distance: self.config.high_mode_reset_distance,
            visibility_threshold: self.config.visibility_threshold,
            selection_suppressed,
        };

        let inputs: Vec<PlanInput> = manager
            .bindings
            .iter()
            .filter_map(|(container, binding_id)| {
                let binding = self.bindings.get(binding_id)?;
                let session = self.sessions.get(&binding.session())?;
                let status = self.containers.get(container).copied().unwrap_or_default();
                let tag = session.tag().clone();
                Some(PlanInput {
                    binding: *binding_id,
                    container: *container,
                    attached: status.attached,
                    layout: status.layout,
                    controller: binding.config().controller,
                    intent: self.intents.get(&tag).copied(),
                    client_started: self.client_started.contains(&tag),
                    tag,
                })
            })
            .collect();

        let plan = manager.plan(&inputs, self.selection.as_ref(), &context);
        debug!(manager = %manager_id, bindings = plan.len(), mode = ?mode, "Refreshing manager");

        for step in plan {
            self.apply(step)?;
        }
        Ok(())
    }

    fn apply(&mut self, step: PlanStep) -> Result<()> {
        let Some(binding) = self.bindings.get_mut(&step.binding) else {
            return Ok(());
        };

        let previous = binding.distance.replace(step.distance);
        if let Some(from) = previous.filter(|from| *from != step.distance) {
            if let Some(callbacks) = binding.config().callbacks.clone() {
                callbacks.on_distance_changed(step.binding, from, step.distance);
            }
            self.emit(CoreEvent::Binding(BindingEvent::DistanceChanged {
                binding_id: step.binding.to_string(),
                from,
                to: step.distance,
            }));
        }

        let Some(binding) = self.bindings.get(&step.binding) else {
            return Ok(());
        };
        if binding.disposition() == Some(step.disposition) {
            return Ok(());
        }

        match step.disposition {
            Disposition::Activate { play } => self.activate(step.binding, play),
            Disposition::Deactivate(retention) => self.deactivate(step.binding, retention),
        }
    }

    fn activate(&mut self, binding_id: BindingId, play: bool) -> Result<()> {
        let Some(binding) = self.bindings.get(&binding_id) else {
            return Ok(());
        };
        let session_id = binding.session();
        let manager_id = binding.manager();
        let container = binding.container().clone();
        let strategy = binding.strategy();
        let needs_renderer = binding.renderer().is_none();

        self.dispatcher
            .cancel(&DeferredTask::ReleaseSession(session_id));

        let prepared = self
            .sessions
            .get(&session_id)
            .ok_or(OrchestratorError::SessionNotFound(session_id))?
            .is_prepared();
        if !prepared {
            self.try_restore_playback_info(session_id)?;
        }

        if needs_renderer {
            let provider = self.provider_for(manager_id, &container.kind);
            let Some(session) = self.sessions.get_mut(&session_id) else {
                return Ok(());
            };
            match strategy.acquire_renderer(provider.as_ref(), &container, session.media()) {
                Ok(renderer) => {
                    session.attach_renderer(renderer.clone());
                    if let Some(binding) = self.bindings.get_mut(&binding_id) {
                        binding.renderer = Some(renderer);
                    }
                }
                Err(err) => {
                    warn!(
                        binding = %binding_id,
                        container = %container.id,
                        error = %err,
                        "Renderer unavailable, binding stays inactive"
                    );
                    if let Some(binding) = self.bindings.get_mut(&binding_id) {
                        binding.transition(BindingState::Inactive);
                    }
                    self.emit(CoreEvent::Session(SessionEvent::Error {
                        session_id: session_id.to_string(),
                        message: err.to_string(),
                    }));
                    return Ok(());
                }
            }
        }

        if let Some(session) = self.sessions.get_mut(&session_id) {
            if !session.is_prepared() {
                session.prepare(false);
                debug!(session = %session_id, "Session prepared");
                self.emit(CoreEvent::Session(SessionEvent::Prepared {
                    session_id: session_id.to_string(),
                }));
            }
        }

        let Some(binding) = self.bindings.get_mut(&binding_id) else {
            return Ok(());
        };
        binding.disposition = Some(Disposition::Activate { play });
        if binding.transition(BindingState::Active) {
            if let Some(callbacks) = binding.config().callbacks.clone() {
                callbacks.on_active(binding_id);
            }
            debug!(binding = %binding_id, "Binding activated");
            self.emit(CoreEvent::Binding(BindingEvent::Activated {
                binding_id: binding_id.to_string(),
                session_id: session_id.to_string(),
            }));
        }

        if play {
            self.start_playback(binding_id);
        } else {
            self.stop_playback(binding_id);
        }
        Ok(())
    }

    fn deactivate(&mut self, binding_id: BindingId, retention: Retention) -> Result<()> {
        self.stop_playback(binding_id);

        let Some(binding) = self.bindings.get_mut(&binding_id) else {
            return Ok(());
        };
        let session_id = binding.session();
        let manager_id = binding.manager();
        let strategy = binding.strategy();
        let kind = binding.container().kind.clone();
        let renderer = binding.renderer.take();

        if let Some(renderer) = renderer {
            let provider = self.provider_for(manager_id, &kind);
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.detach_renderer();
            }
            strategy.release_renderer(provider.as_ref(), renderer);
        }

        let (prepared, allocated) = self
            .sessions
            .get(&session_id)
            .map_or((false, false), |session| {
                (session.is_prepared(), session.is_allocated())
            });
        match retention {
            Retention::Pause => {}
            Retention::Reset if prepared => {
                self.save_playback_info(session_id);
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.reset();
                }
            }
            Retention::Release if allocated => {
                let due = self.now_millis() + duration_millis(self.config.release_grace);
                self.dispatcher.schedule(
                    DeferredTask::ReleaseSession(session_id),
                    due,
                    Some(manager_id),
                );
            }
            Retention::Reset | Retention::Release => {}
        }

        let Some(binding) = self.bindings.get_mut(&binding_id) else {
            return Ok(());
        };
        let was_active = binding.state() == BindingState::Active;
        binding.disposition = Some(Disposition::Deactivate(retention));
        if binding.transition(BindingState::Inactive) && was_active {
            if let Some(callbacks) = binding.config().callbacks.clone() {
                callbacks.on_inactive(binding_id);
            }
        }

        debug!(binding = %binding_id, retention = ?retention, "Binding deactivated");
        self.emit(CoreEvent::Binding(BindingEvent::Deactivated {
            binding_id: binding_id.to_string(),
            session_id: session_id.to_string(),
            retention: retention.into(),
        }));
        Ok(())
    }

    fn start_playback(&mut self, binding_id: BindingId) {
        let Some(binding) = self.bindings.get(&binding_id) else {
            return;
        };
        if binding.is_playing() {
            return;
        }

        let delay = binding.config().delay;
        if delay.is_zero() {
            self.play_now(binding_id);
            return;
        }

        let task = DeferredTask::DelayedStart(binding_id);
        if !self.dispatcher.is_scheduled(&task) {
            let due = self.now_millis() + duration_millis(delay);
            let scope = Some(binding.manager());
            self.dispatcher.schedule(task, due, scope);
        }
    }

    fn play_now(&mut self, binding_id: BindingId) {
        let Some(binding) = self.bindings.get_mut(&binding_id) else {
            return;
        };
        let Some(session) = self.sessions.get_mut(&binding.session()) else {
            return;
        };
        session.play();
        binding.playing = true;
        debug!(binding = %binding_id, "Playing");
        self.emit(CoreEvent::Binding(BindingEvent::Playing {
            binding_id: binding_id.to_string(),
        }));
    }

    fn stop_playback(&mut self, binding_id: BindingId) {
        self.dispatcher
            .cancel(&DeferredTask::DelayedStart(binding_id));

        let Some(binding) = self.bindings.get_mut(&binding_id) else {
            return;
        };
        let Some(session) = self.sessions.get_mut(&binding.session()) else {
            return;
        };
        if !binding.playing && !session.is_playing() {
            return;
        }
        session.pause();
        binding.playing = false;
        debug!(binding = %binding_id, "Paused");
        self.emit(CoreEvent::Binding(BindingEvent::Paused {
            binding_id: binding_id.to_string(),
        }));
    }

    // ------------------------------------------------------------------------
    // Helpers and accessors
    // ------------------------------------------------------------------------

    fn emit(&self, event: CoreEvent) {
        self.events.emit(event).ok();
    }

    fn now_millis(&self) -> i64 {
        self.config.clock.unix_timestamp_millis()
    }

    fn is_attached(&self, container: &ContainerId) -> bool {
        self.containers
            .get(container)
            .is_some_and(|status| status.attached)
    }

    fn group_of(&self, manager_id: ManagerId) -> Option<&Group> {
        let manager = self.managers.get(&manager_id)?;
        self.groups
            .iter()
            .find(|group| group.id() == manager.group())
    }

    fn provider_for(
        &self,
        manager_id: ManagerId,
        kind: &ContainerKind,
    ) -> Option<Arc<dyn RendererProvider>> {
        self.group_of(manager_id)?.provider(kind).cloned()
    }

    pub fn session(&self, session_id: SessionId) -> Option<&PlaybackSession> {
        self.sessions.get(&session_id)
    }

    pub fn binding(&self, binding_id: BindingId) -> Option<&Binding> {
        self.bindings.get(&binding_id)
    }

    pub fn manager(&self, manager_id: ManagerId) -> Option<&Manager> {
        self.managers.get(&manager_id)
    }

    pub fn group_for(&self, root: RootId) -> Option<&Group> {
        self.groups.iter().find(|group| group.root() == root)
    }

    pub fn binding_for_container(&self, container: &ContainerId) -> Option<&Binding> {
        self.container_index
            .get(container)
            .and_then(|binding| self.bindings.get(binding))
    }

    pub fn binding_of(&self, session_id: SessionId) -> Option<&Binding> {
        self.sessions
            .get(&session_id)?
            .binding()
            .and_then(|binding| self.bindings.get(&binding))
    }

    pub fn has_pending_request(&self, container: &ContainerId) -> bool {
        self.pending.contains_key(container)
    }

    pub fn is_release_pending(&self, session_id: SessionId) -> bool {
        self.dispatcher
            .is_scheduled(&DeferredTask::ReleaseSession(session_id))
    }

    pub fn info_store(&self) -> &PlaybackInfoStore {
        &self.info_store
    }

    pub fn intent(&self, tag: &Tag) -> Option<PlaybackIntent> {
        self.intents.get(tag).copied()
    }

    pub fn is_client_started(&self, tag: &Tag) -> bool {
        self.client_started.contains(tag)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for Master {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Master")
            .field("groups", &self.groups.len())
            .field("managers", &self.managers.len())
            .field("bindings", &self.bindings.len())
            .field("sessions", &self.sessions.len())
            .field("pending", &self.pending.len())
            .field("deferred", &self.dispatcher.len())
            .finish()
    }
}

fn duration_millis(duration: std::time::Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
