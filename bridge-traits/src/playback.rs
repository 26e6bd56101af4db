//! Playback bridge contract and supporting media types.
//!
//! A [`Bridge`] is the per-session handle to the host's decode/render engine.
//! The orchestrator never decodes anything itself; it only decides *when* the
//! bridge is prepared, played, paused, reset or released. All calls are
//! fire-and-forget: results (state changes, errors) come back through the
//! host's own callback channel and must be re-entered onto the control thread
//! before they touch orchestrator state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::platform::PlatformSend;

/// DRM scheme attached to protected media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrmInfo {
    /// Scheme identifier (e.g. "widevine").
    pub scheme: String,
    /// License server endpoint.
    pub license_url: String,
}

/// Media descriptor handed to engines and renderer providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Media {
    /// Location of the media resource.
    pub uri: String,
    /// Optional MIME type hint.
    pub mime_type: Option<String>,
    /// DRM configuration, when the media is protected.
    pub drm: Option<DrmInfo>,
}

impl Media {
    /// Create an unprotected media descriptor.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            drm: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_drm(mut self, drm: DrmInfo) -> Self {
        self.drm = Some(drm);
        self
    }

    /// Returns `true` if the media requires a DRM-capable surface.
    pub fn is_protected(&self) -> bool {
        self.drm.is_some()
    }
}

/// Coarse player state reported by a bridge.
///
/// Ordering matters: restoring a saved [`PlaybackInfo`] is only allowed while
/// the player has not progressed past [`PlayerState::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Volume snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub muted: bool,
    /// 0.0 = silent, 1.0 = unity gain.
    pub volume: f32,
}

impl Default for VolumeInfo {
    fn default() -> Self {
        Self {
            muted: false,
            volume: 1.0,
        }
    }
}

/// Position and volume snapshot of a session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackInfo {
    /// Index of the current window for playlist-like media.
    pub resume_window: u32,
    /// Resume position inside the current window.
    pub resume_position: Duration,
    pub volume: VolumeInfo,
}

impl PlaybackInfo {
    pub fn new(resume_window: u32, resume_position: Duration, volume: VolumeInfo) -> Self {
        Self {
            resume_window,
            resume_position,
            volume,
        }
    }

    /// Snapshot at the given position with default volume.
    pub fn at(resume_position: Duration) -> Self {
        Self {
            resume_position,
            ..Default::default()
        }
    }
}

/// Opaque renderer handed to a bridge (a view, a surface, a texture...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RendererHandle {
    /// Identifier assigned by whoever produced the renderer.
    pub id: u64,
    /// Variant the renderer was created for.
    pub variant: String,
}

impl RendererHandle {
    pub fn new(id: u64, variant: impl Into<String>) -> Self {
        Self {
            id,
            variant: variant.into(),
        }
    }
}

/// Per-session handle to the decode/playback engine.
///
/// Implementations must tolerate [`Bridge::release`] without a prior
/// [`Bridge::prepare`], and repeated `pause`/`release` calls.
pub trait Bridge: PlatformSend {
    /// Prepare the underlying player. `load_source` asks the engine to start
    /// fetching media right away instead of on first play.
    fn prepare(&mut self, load_source: bool);

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop playback and drop buffered media, keeping the player instance.
    fn reset(&mut self);

    /// Release every resource held by the player.
    fn release(&mut self);

    fn seek_to(&mut self, position: Duration);

    fn is_playing(&self) -> bool;

    fn player_state(&self) -> PlayerState;

    fn playback_info(&self) -> PlaybackInfo;

    fn set_playback_info(&mut self, info: PlaybackInfo);

    /// Hand a renderer to the engine. The default ignores it, which suits
    /// engines that draw straight into their container.
    fn attach_renderer(&mut self, _renderer: RendererHandle) {}

    /// Take the current renderer back from the engine.
    fn detach_renderer(&mut self) -> Option<RendererHandle> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_state_ordering() {
        assert!(PlayerState::Idle < PlayerState::Buffering);
        assert!(PlayerState::Buffering < PlayerState::Ready);
        assert!(PlayerState::Idle <= PlayerState::Idle);
    }

    #[test]
    fn test_media_builder() {
        let media = Media::new("https://cdn.example.com/clip.mp4").with_mime_type("video/mp4");
        assert!(!media.is_protected());
        assert_eq!(media.mime_type.as_deref(), Some("video/mp4"));

        let protected = media.with_drm(DrmInfo {
            scheme: "widevine".to_string(),
            license_url: "https://license.example.com".to_string(),
        });
        assert!(protected.is_protected());
    }

    #[test]
    fn test_playback_info_at() {
        let info = PlaybackInfo::at(Duration::from_secs(12));
        assert_eq!(info.resume_position, Duration::from_secs(12));
        assert_eq!(info.resume_window, 0);
        assert_eq!(info.volume, VolumeInfo::default());
    }
}
