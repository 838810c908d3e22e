//! Scroll-context hooks of the view hosting a subscription.

/// Implemented by the view layer. Both calls happen on the polling task,
/// while the session identity is held, right around a refresh publish.
pub trait Viewport: Send + Sync {
    /// Current distance from the top of the scrollable content, in pixels.
    fn scroll_offset(&self) -> f64;

    /// Brings the anchor element back into view after a re-render.
    fn restore_anchor(&self);
}

/// Decides, before a refresh is applied, whether the anchor must be restored after it.
pub(crate) fn needs_restore(viewport: &dyn Viewport, threshold_px: f64) -> bool {
    viewport.scroll_offset() > threshold_px
}
