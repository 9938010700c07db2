//! # Viewport
//!
//! The camera-state derived world <-> screen transform. Zoom, center and
//! size are plain state; every transform is a pure function of that
//! state, recomputed on use. The viewport never caches a transform
//! across state changes.

use crate::point::{ScreenPoint, WorldPoint};
use crate::rect::WorldRect;

/// Lowest permitted zoom level.
pub const MIN_ZOOM: f64 = 1.0;

/// Highest permitted zoom level.
pub const MAX_ZOOM: f64 = 15.0;

/// Current view over the world plane.
///
/// Zoom is clamped into `[MIN_ZOOM, MAX_ZOOM]` on every write; no code
/// path can observe an out-of-range zoom.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    zoom: f64,
    center: WorldPoint,
    size: ScreenPoint,
}

impl Viewport {
    /// Creates a viewport of the given pixel size, centered on the world
    /// plane at minimum zoom.
    #[must_use]
    pub fn new(size: ScreenPoint) -> Self {
        Self {
            zoom: MIN_ZOOM,
            center: WorldPoint::new(
                crate::point::WORLD_SIZE / 2.0,
                crate::point::WORLD_SIZE / 2.0,
            ),
            size,
        }
    }

    /// Current zoom level.
    #[inline]
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Sets the zoom level, clamped into `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Current world-plane center.
    #[inline]
    #[must_use]
    pub fn center(&self) -> WorldPoint {
        self.center
    }

    /// Moves the view center.
    pub fn set_center(&mut self, center: WorldPoint) {
        self.center = center;
    }

    /// Viewport size in pixels.
    #[inline]
    #[must_use]
    pub fn size(&self) -> ScreenPoint {
        self.size
    }

    /// Resizes the viewport.
    pub fn set_size(&mut self, size: ScreenPoint) {
        self.size = size;
    }

    /// Screen center in pixels.
    #[inline]
    #[must_use]
    pub fn screen_center(&self) -> ScreenPoint {
        self.size * 0.5
    }

    /// Pixels per world unit at the current zoom.
    #[inline]
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.zoom.exp2()
    }

    /// Converts a screen point to world coordinates.
    ///
    /// Pure function of current state.
    #[must_use]
    pub fn get_map_coord(&self, p: ScreenPoint) -> WorldPoint {
        let offset = p - self.screen_center();
        let scale = self.scale();
        self.center + WorldPoint::new(offset.x / scale, offset.y / scale)
    }

    /// Converts a world point to screen coordinates.
    ///
    /// Inverse of [`Viewport::get_map_coord`].
    #[must_use]
    pub fn get_view_coord(&self, p: WorldPoint) -> ScreenPoint {
        let offset = p - self.center;
        let scale = self.scale();
        self.screen_center() + ScreenPoint::new(offset.x * scale, offset.y * scale)
    }

    /// The world rectangle currently visible.
    #[must_use]
    pub fn visible_world_rect(&self) -> WorldRect {
        let top_left = self.get_map_coord(ScreenPoint::new(0.0, 0.0));
        let bottom_right = self.get_map_coord(self.size);
        WorldRect::from_corners(top_left, bottom_right)
    }
}
