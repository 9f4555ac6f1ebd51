//! Per-sequence animation state
//!
//! **Why**: Each tile animates independently: its own frame index, its
//! own pause flag, its own first-load lifecycle. Keeping that state in a
//! plain struct (no UI types) lets the scheduler be tested headless.
//!
//! **Used by**: Wall (tick state machine), App (display + click-to-pause)
//!
//! # Lifecycle
//!
//! `Unloaded -> Loading -> Loaded`. `Loading` doubles as the in-flight
//! flag: while set, no second first-frame job is submitted for this tile.
//! `Loaded` self-transitions on every animation step. A failed load goes
//! back to `Unloaded` with an error string, so a later tick may retry
//! once the tile is visible again.

use image::RgbImage;
use std::sync::Arc;

/// First-frame load lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Mutable animation state bound to one sequence
#[derive(Debug)]
pub struct TileAnim {
    /// Current frame position, wraps modulo frame count
    pub frame_idx: usize,
    /// Per-tile pause flag, independent of the global play flag
    pub running: bool,
    load: LoadState,
    /// Latest rendered bitmap for display
    image: Option<Arc<RgbImage>>,
    /// Inline error text shown instead of the thumbnail
    error: Option<String>,
    /// Set when `image` changed since the UI last uploaded a texture
    dirty: bool,
}

impl TileAnim {
    pub fn new() -> Self {
        Self {
            frame_idx: 0,
            running: true,
            load: LoadState::Unloaded,
            image: None,
            error: None,
            dirty: false,
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn is_loaded(&self) -> bool {
        self.load == LoadState::Loaded
    }

    /// Claim the first-frame load (Unloaded -> Loading)
    pub fn mark_loading(&mut self) {
        self.load = LoadState::Loading;
    }

    /// Store a rendered frame and mark the tile loaded
    pub fn set_image(&mut self, image: Arc<RgbImage>) {
        self.image = Some(image);
        self.load = LoadState::Loaded;
        self.error = None;
        self.dirty = true;
    }

    /// Record a failed load; the tile shows the error and may retry later
    pub fn set_error(&mut self, error: String) {
        self.error = Some(error);
        self.load = LoadState::Unloaded;
        self.image = None;
        self.dirty = true;
    }

    pub fn image(&self) -> Option<&Arc<RgbImage>> {
        self.image.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Advance the frame index by `step` modulo `frame_count`
    pub fn advance(&mut self, step: usize, frame_count: usize) {
        if frame_count > 0 {
            self.frame_idx = (self.frame_idx + step) % frame_count;
        }
    }

    /// Click-to-pause: flips only this tile's running flag
    pub fn toggle_running(&mut self) {
        self.running = !self.running;
    }

    /// True once after each image change; the UI uses it to decide when
    /// to re-upload the texture
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for TileAnim {
    fn default() -> Self {
        Self::new()
    }
}
