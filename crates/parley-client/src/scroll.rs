//! Scroll policy for the chat viewport.
//!
//! Log mutation and layout are not atomic: state changes first, the
//! rendered view catches up a paint later. Callers record intent at
//! mutation time (`on_*`) and resolve it against fresh measurements
//! once layout settled (`take_correction`). An anchor correction whose
//! measurements show layout has not caught up yet stays pending for the
//! next paint.

use parley_shared::constants::AUTO_SCROLL_THRESHOLD_PX;

/// Viewport measurements supplied by the rendering layer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    /// Scroll offset from the top of the content.
    pub scroll_top: f64,
    /// Visible height of the viewport.
    pub viewport_height: f64,
    /// Total height of the rendered content.
    pub content_height: f64,
}

impl ViewportMetrics {
    /// Distance between the viewport's bottom edge and the bottom of the
    /// content.
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - (self.scroll_top + self.viewport_height)).max(0.0)
    }

    /// Whether the viewport is close enough to the bottom for live
    /// appends to keep following it.
    pub fn near_bottom(&self) -> bool {
        self.distance_from_bottom() <= AUTO_SCROLL_THRESHOLD_PX
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    /// First page of a chat was just displayed; jump to the newest line.
    JumpToBottom,
    /// Older messages were prepended; hold the reader's anchor steady.
    PreserveAnchor {
        prior_scroll_top: f64,
        prior_content_height: f64,
    },
    /// A live message arrived with the viewport near the bottom.
    FollowBottom,
}

/// Scroll coordinator for the open chat's viewport.
#[derive(Debug)]
pub struct ScrollAnchor {
    pending: Option<Pending>,
    near_bottom: bool,
}

impl ScrollAnchor {
    pub fn new() -> Self {
        // A chat opens pinned to its newest message.
        Self {
            pending: None,
            near_bottom: true,
        }
    }

    /// Record a scroll or resize observation from the view.
    pub fn observe(&mut self, metrics: ViewportMetrics) {
        self.near_bottom = metrics.near_bottom();
    }

    /// The first window of a chat was just committed.
    pub fn on_first_display(&mut self) {
        self.pending = Some(Pending::JumpToBottom);
        self.near_bottom = true;
    }

    /// Older messages were revealed above the viewport. `before` is the
    /// measurement taken before the mutation.
    pub fn on_load_older(&mut self, before: ViewportMetrics) {
        self.pending = Some(Pending::PreserveAnchor {
            prior_scroll_top: before.scroll_top,
            prior_content_height: before.content_height,
        });
    }

    /// A live message was appended to the open chat. Near the bottom the
    /// view keeps following; a reader scrolled up into history is left
    /// alone. A pending anchor correction is never displaced.
    pub fn on_live_append(&mut self) {
        if self.near_bottom && self.pending.is_none() {
            self.pending = Some(Pending::FollowBottom);
        }
    }

    /// Drop any queued correction, e.g. when the viewport switches to
    /// another chat.
    pub fn reset(&mut self) {
        self.pending = None;
        self.near_bottom = true;
    }

    /// Resolve the pending intent against post-paint measurements.
    ///
    /// Returns the scroll offset to apply, or `None` when nothing is
    /// pending. An anchor preservation whose measurements still show the
    /// pre-mutation height stays queued for the next paint.
    pub fn take_correction(&mut self, after: ViewportMetrics) -> Option<f64> {
        let target = match self.pending? {
            Pending::JumpToBottom | Pending::FollowBottom => {
                self.near_bottom = true;
                bottom_offset(after)
            }
            Pending::PreserveAnchor {
                prior_scroll_top,
                prior_content_height,
            } => {
                if after.content_height <= prior_content_height {
                    // Layout still reports the old height; keep waiting.
                    return None;
                }
                prior_scroll_top + (after.content_height - prior_content_height)
            }
        };
        self.pending = None;
        Some(target)
    }
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new()
    }
}

fn bottom_offset(metrics: ViewportMetrics) -> f64 {
    (metrics.content_height - metrics.viewport_height).max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
