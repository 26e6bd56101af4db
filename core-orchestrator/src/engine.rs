//! Engines create bridges for one renderer type; binders carry a bind
//! request from `set_up` to `bind`.
//!
//! ```ignore
//! let session = master
//!     .set_up(Media::new("https://cdn.example/clip.mp4"))?
//!     .tag(Tag::new("clip"))
//!     .config(BindingConfig::default().with_delay(Duration::from_millis(200)))
//!     .bind(ContainerRef::new(7, "PlayerView"))?;
//! ```

use bridge_traits::{Bridge, ContainerRef, Media};
use std::sync::Arc;

use crate::binding::BindingConfig;
use crate::error::Result;
use crate::master::Master;
use crate::types::{BindingId, SessionId, Tag};

/// Renderer type used by [`Master::set_up`].
pub const DEFAULT_RENDERER_TYPE: &str = "default";

/// Per renderer type session factory.
pub trait Engine: Send + Sync {
    fn renderer_type(&self) -> &str;

    fn create_bridge(&self, media: &Media) -> bridge_traits::error::Result<Box<dyn Bridge>>;
}

/// Lazily creates engines for renderer types nobody registered.
pub type EngineFactory = Box<dyn Fn(&str) -> Option<Arc<dyn Engine>> + Send + Sync>;

/// Completion callback receiving the resolved binding.
pub type BindCallback = Box<dyn FnOnce(BindingId) + Send>;

/// Builder returned by [`Master::set_up`].
pub struct Binder<'m> {
    master: &'m mut Master,
    engine: Arc<dyn Engine>,
    media: Media,
    tag: Tag,
    config: BindingConfig,
    callback: Option<BindCallback>,
}

impl<'m> Binder<'m> {
    pub(crate) fn new(master: &'m mut Master, engine: Arc<dyn Engine>, media: Media) -> Self {
        Self {
            master,
            engine,
            media,
            tag: Tag::None,
            config: BindingConfig::default(),
            callback: None,
        }
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(BindingId) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Create or reuse the session for the tag and request the binding.
    ///
    /// The binding resolves immediately when the container is attached,
    /// otherwise on its next attach.
    pub fn bind(self, container: ContainerRef) -> Result<SessionId> {
        let Binder {
            master,
            engine,
            media,
            tag,
            config,
            callback,
        } = self;

        let session = master.session_for(engine.as_ref(), media, tag)?;
        master.bind(session, container, config, callback)?;
        Ok(session)
    }
}
