//! Renderer provider contract.
//!
//! Providers pick a renderer variant for a media descriptor and produce
//! renderers on demand. Any pooling of renderers lives in the provider, the
//! orchestrator only requests one before activating a binding and hands it
//! back after deactivating.

use crate::{
    error::Result,
    lifecycle::ContainerId,
    platform::PlatformSendSync,
    playback::{Media, RendererHandle},
};

/// Variant key returned by [`RendererProvider::select_variant`].
pub type VariantKey = String;

/// Context describing the binding a renderer is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererContext {
    /// Container the renderer will be mounted into.
    pub container: ContainerId,
    /// Media the renderer will display.
    pub media: Media,
}

/// Renderer factory registered per container kind.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::renderer::{RendererContext, RendererProvider, VariantKey};
///
/// struct SurfaceProvider;
///
/// impl RendererProvider for SurfaceProvider {
///     fn select_variant(&self, media: &Media) -> VariantKey {
///         if media.is_protected() { "surface".into() } else { "texture".into() }
///     }
///     // ...
/// }
/// ```
pub trait RendererProvider: PlatformSendSync {
    /// Pure selection of the renderer variant for a media descriptor.
    fn select_variant(&self, media: &Media) -> VariantKey;

    /// Produce a renderer for the given variant.
    fn create_renderer(&self, context: &RendererContext, variant: &VariantKey)
        -> Result<RendererHandle>;

    /// Return a renderer once the binding no longer needs it.
    fn release_renderer(&self, renderer: RendererHandle);
}
