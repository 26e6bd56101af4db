//! Shared collaborators for the orchestrator integration tests.
//!
//! Bridges record every call into one shared log so tests can assert on the
//! exact sequence the scheduler issued per media URI.

#![allow(dead_code)]

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    Bridge, BridgeError, ContainerId, Host, HostId, HostLifecycle, ManualClock, Media,
    PlaybackInfo, PlayerState, RendererContext, RendererHandle, RendererProvider, RootId,
    VariantKey,
};
use core_orchestrator::{
    BindingConfig, BindingId, ContainerLayout, ControlHandle, Engine, Master, SessionId, Tag,
};
use core_runtime::config::{MemoryMode, OrchestratorConfig};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ROOT: RootId = RootId(1);
pub const KIND: &str = "PlayerView";
pub const GRACE_MS: u64 = 500;

// ============================================================================
// Bridge
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Prepare,
    Play,
    Pause,
    Reset,
    Release,
    SetInfo(Duration),
    AttachRenderer(u64),
    DetachRenderer,
}

pub type CallLog = Arc<Mutex<Vec<(String, Call)>>>;

pub struct RecordingBridge {
    uri: String,
    log: CallLog,
    state: PlayerState,
    playing: bool,
    info: PlaybackInfo,
    renderer: Option<RendererHandle>,
}

impl RecordingBridge {
    fn record(&self, call: Call) {
        self.log.lock().push((self.uri.clone(), call));
    }
}

impl Bridge for RecordingBridge {
    fn prepare(&mut self, _load_source: bool) {
        self.record(Call::Prepare);
        self.state = PlayerState::Ready;
    }

    fn play(&mut self) {
        self.record(Call::Play);
        self.playing = true;
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
        self.playing = false;
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
        self.playing = false;
        self.state = PlayerState::Idle;
        self.info = PlaybackInfo::default();
    }

    fn release(&mut self) {
        self.record(Call::Release);
        self.playing = false;
        self.state = PlayerState::Idle;
    }

    fn seek_to(&mut self, position: Duration) {
        self.info.resume_position = position;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn player_state(&self) -> PlayerState {
        self.state
    }

    fn playback_info(&self) -> PlaybackInfo {
        self.info
    }

    fn set_playback_info(&mut self, info: PlaybackInfo) {
        self.record(Call::SetInfo(info.resume_position));
        self.info = info;
    }

    fn attach_renderer(&mut self, renderer: RendererHandle) {
        self.record(Call::AttachRenderer(renderer.id));
        self.renderer = Some(renderer);
    }

    fn detach_renderer(&mut self) -> Option<RendererHandle> {
        self.record(Call::DetachRenderer);
        self.renderer.take()
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct TestEngine {
    renderer_type: String,
    log: CallLog,
    start_position: Duration,
    created: AtomicU64,
}

impl TestEngine {
    pub fn new(renderer_type: &str, log: CallLog) -> Self {
        Self {
            renderer_type: renderer_type.to_string(),
            log,
            start_position: Duration::from_secs(30),
            created: AtomicU64::new(0),
        }
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

impl Engine for TestEngine {
    fn renderer_type(&self) -> &str {
        &self.renderer_type
    }

    fn create_bridge(&self, media: &Media) -> BridgeResult<Box<dyn Bridge>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingBridge {
            uri: media.uri.clone(),
            log: Arc::clone(&self.log),
            state: PlayerState::Idle,
            playing: false,
            info: PlaybackInfo::at(self.start_position),
            renderer: None,
        }))
    }
}

// ============================================================================
// Host
// ============================================================================

pub struct TestHost {
    id: HostId,
    claimed: Mutex<HashSet<u64>>,
}

impl TestHost {
    pub fn new(id: u64, containers: impl IntoIterator<Item = u64>) -> Arc<Self> {
        Arc::new(Self {
            id: HostId(id),
            claimed: Mutex::new(containers.into_iter().collect()),
        })
    }

    pub fn claim(&self, container: u64) {
        self.claimed.lock().insert(container);
    }

    pub fn host_id(&self) -> HostId {
        self.id
    }
}

impl Host for TestHost {
    fn id(&self) -> HostId {
        self.id
    }

    fn claims(&self, container: &ContainerId) -> bool {
        self.claimed.lock().contains(&container.0)
    }
}

// ============================================================================
// Renderer provider
// ============================================================================

#[derive(Default)]
pub struct TestProvider {
    next_id: AtomicU64,
    fail: AtomicBool,
    pub created: Mutex<Vec<u64>>,
    pub released: Mutex<Vec<u64>>,
}

impl TestProvider {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl RendererProvider for TestProvider {
    fn select_variant(&self, media: &Media) -> VariantKey {
        if media.is_protected() {
            "secure".to_string()
        } else {
            "texture".to_string()
        }
    }

    fn create_renderer(
        &self,
        _context: &RendererContext,
        variant: &VariantKey,
    ) -> BridgeResult<RendererHandle> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::RendererUnavailable("pool exhausted".to_string()));
        }
        let id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().push(id);
        Ok(RendererHandle::new(id, variant.clone()))
    }

    fn release_renderer(&self, renderer: RendererHandle) {
        self.released.lock().push(renderer.id);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub master: Master,
    pub clock: Arc<ManualClock>,
    pub control: ControlHandle,
    pub log: CallLog,
    pub engine: Arc<TestEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    pub fn with_config<F>(configure: F) -> Self
    where
        F: FnOnce(
            core_runtime::config::OrchestratorConfigBuilder,
        ) -> core_runtime::config::OrchestratorConfigBuilder,
    {
        let clock = Arc::new(ManualClock::new(0));
        let builder = OrchestratorConfig::builder()
            .clock(clock.clone())
            .release_grace(Duration::from_millis(GRACE_MS));
        let config = configure(builder).build().unwrap();

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(TestEngine::new(
            core_orchestrator::DEFAULT_RENDERER_TYPE,
            Arc::clone(&log),
        ));
        let mut master = Master::new(config).unwrap();
        master.register_engine(engine.clone());
        let control = master.control_handle();

        Self {
            master,
            clock,
            control,
            log,
            engine,
        }
    }

    /// Register `host` under [`ROOT`] and resume it.
    pub fn resumed_host(&mut self, host: &Arc<TestHost>, mode: MemoryMode) {
        self.master.register(ROOT, host.clone(), mode);
        self.control
            .host_lifecycle(host.host_id(), HostLifecycle::Resumed)
            .unwrap();
        self.pump();
    }

    pub fn bind(&mut self, uri: &str, container: u64) -> SessionId {
        self.bind_with(uri, container, BindingConfig::default())
    }

    pub fn bind_with(&mut self, uri: &str, container: u64, config: BindingConfig) -> SessionId {
        self.master
            .set_up(Media::new(uri))
            .unwrap()
            .tag(Tag::new(uri))
            .config(config)
            .bind(bridge_traits::ContainerRef::new(container, KIND))
            .unwrap()
    }

    pub fn attach(&mut self, container: u64, ordinal: i64, visible: f32) {
        self.control
            .container_attached(ContainerId(container), ContainerLayout::new(ordinal, visible))
            .unwrap();
    }

    pub fn layout(&mut self, container: u64, ordinal: i64, visible: f32) {
        self.control
            .container_layout(ContainerId(container), ContainerLayout::new(ordinal, visible))
            .unwrap();
    }

    pub fn detach(&mut self, container: u64) {
        self.control
            .container_detached(ContainerId(container))
            .unwrap();
    }

    pub fn pump(&mut self) {
        self.master.pump().unwrap();
    }

    pub fn advance(&mut self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
        self.pump();
    }

    pub fn binding_at(&self, container: u64) -> Option<BindingId> {
        self.master
            .binding_for_container(&ContainerId(container))
            .map(|binding| binding.id())
    }

    pub fn calls(&self, uri: &str) -> Vec<Call> {
        self.log
            .lock()
            .iter()
            .filter(|(entry, _)| entry == uri)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, uri: &str, call: &Call) -> usize {
        self.calls(uri).iter().filter(|c| *c == call).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}
