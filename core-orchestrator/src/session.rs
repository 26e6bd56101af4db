//! Playback sessions: one piece of media plus the bridge that plays it.
//!
//! A session never owns a surface. It is owned by the master registry from
//! creation until teardown and is bound to at most one container at a time.

use bridge_traits::{Bridge, Media, PlaybackInfo, PlayerState, RendererHandle};
use std::fmt;

use crate::types::{BindingId, ManagerId, SessionId, Tag};

/// Who is currently responsible for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Owner {
    #[default]
    None,
    /// Bind request recorded, no binding yet. Swept at startup if orphaned.
    Provisional,
    Manager(ManagerId),
}

pub struct PlaybackSession {
    id: SessionId,
    media: Media,
    tag: Tag,
    renderer_type: String,
    bridge: Box<dyn Bridge>,
    pub(crate) owner: Owner,
    pub(crate) binding: Option<BindingId>,
    prepared: bool,
    /// Player instance held since the last prepare; reset keeps it.
    allocated: bool,
    reported_state: Option<PlayerState>,
}

impl PlaybackSession {
    pub fn new(
        media: Media,
        tag: Tag,
        renderer_type: impl Into<String>,
        bridge: Box<dyn Bridge>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            media,
            tag,
            renderer_type: renderer_type.into(),
            bridge,
            owner: Owner::None,
            binding: None,
            prepared: false,
            allocated: false,
            reported_state: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn renderer_type(&self) -> &str {
        &self.renderer_type
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn binding(&self) -> Option<BindingId> {
        self.binding
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// `true` until the bridge is released, even after a reset.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Idle according to both the bridge and the last platform report.
    pub fn is_idle(&self) -> bool {
        self.player_state() == PlayerState::Idle
            && self.reported_state.map_or(true, |state| state == PlayerState::Idle)
    }

    /// Current player state as seen by the bridge.
    pub fn player_state(&self) -> PlayerState {
        self.bridge.player_state()
    }

    /// Last state pushed through the control handle, if any.
    pub fn reported_state(&self) -> Option<PlayerState> {
        self.reported_state
    }

    pub fn is_playing(&self) -> bool {
        self.bridge.is_playing()
    }

    pub fn playback_info(&self) -> PlaybackInfo {
        self.bridge.playback_info()
    }

    pub(crate) fn set_playback_info(&mut self, info: PlaybackInfo) {
        self.bridge.set_playback_info(info);
    }

    pub(crate) fn report_state(&mut self, state: PlayerState) {
        self.reported_state = Some(state);
    }

    pub(crate) fn prepare(&mut self, load_source: bool) {
        self.bridge.prepare(load_source);
        self.prepared = true;
        self.allocated = true;
    }

    pub(crate) fn play(&mut self) {
        self.bridge.play();
    }

    pub(crate) fn pause(&mut self) {
        self.bridge.pause();
    }

    /// Reset keeps the player instance but drops loaded media.
    pub(crate) fn reset(&mut self) {
        self.bridge.reset();
        self.prepared = false;
        self.reported_state = None;
    }

    pub(crate) fn release(&mut self) {
        self.bridge.release();
        self.prepared = false;
        self.allocated = false;
        self.reported_state = None;
    }

    pub(crate) fn attach_renderer(&mut self, renderer: RendererHandle) {
        self.bridge.attach_renderer(renderer);
    }

    pub(crate) fn detach_renderer(&mut self) -> Option<RendererHandle> {
        self.bridge.detach_renderer()
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("media", &self.media.uri)
            .field("owner", &self.owner)
            .field("binding", &self.binding)
            .field("prepared", &self.prepared)
            .field("allocated", &self.allocated)
            .finish()
    }
}
