//! # Cell Addressing
//!
//! A cell is one quadtree-addressed unit of tiled map data. At zoom `z`
//! the world plane splits into `2^z x 2^z` cells; addresses at a given
//! zoom tile the plane without gaps or overlaps.

use meridian_geo::{WorldPoint, WorldRect, WORLD_SIZE};

/// Address of one spatial quadtree cell: zoom level plus tile x/y.
///
/// Used as the cache key for both raster tiles and vector fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Zoom level; the plane holds `2^zoom` cells per side.
    pub zoom: u8,
    /// Column index, `0..2^zoom`.
    pub x: i32,
    /// Row index, `0..2^zoom`.
    pub y: i32,
}

impl CellKey {
    /// Creates a cell address.
    #[inline]
    #[must_use]
    pub const fn new(zoom: u8, x: i32, y: i32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of cells per side at this zoom.
    #[inline]
    #[must_use]
    pub const fn cells_per_side(zoom: u8) -> i32 {
        1 << zoom
    }

    /// Side length of one cell at this zoom, in world units.
    #[inline]
    #[must_use]
    pub fn side(zoom: u8) -> f64 {
        WORLD_SIZE / f64::from(Self::cells_per_side(zoom))
    }

    /// The cell containing a world point at the given zoom.
    ///
    /// Points outside the world plane clamp to the border cells, so the
    /// tiling stays gap-free at the edges.
    #[must_use]
    pub fn containing(p: WorldPoint, zoom: u8) -> Self {
        let side = Self::side(zoom);
        let last = Self::cells_per_side(zoom) - 1;
        #[allow(clippy::cast_possible_truncation)]
        let x = ((p.x / side).floor() as i32).clamp(0, last);
        #[allow(clippy::cast_possible_truncation)]
        let y = ((p.y / side).floor() as i32).clamp(0, last);
        Self::new(zoom, x, y)
    }

    /// The world rectangle covered by this cell.
    #[must_use]
    pub fn world_rect(&self) -> WorldRect {
        let side = Self::side(self.zoom);
        WorldRect::new(
            WorldPoint::new(f64::from(self.x) * side, f64::from(self.y) * side),
            WorldPoint::new(side, side),
        )
    }

    /// The parent cell one zoom level up, or `None` at zoom 0.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.zoom == 0 {
            return None;
        }
        Some(Self::new(self.zoom - 1, self.x >> 1, self.y >> 1))
    }

    /// The four child cells one zoom level down.
    #[must_use]
    pub fn children(&self) -> [Self; 4] {
        let z = self.zoom + 1;
        let (x, y) = (self.x << 1, self.y << 1);
        [
            Self::new(z, x, y),
            Self::new(z, x + 1, y),
            Self::new(z, x, y + 1),
            Self::new(z, x + 1, y + 1),
        ]
    }

    /// Enumerates the cells covering a world rectangle at the given zoom.
    ///
    /// The rectangle is clipped to the world plane first; an empty or
    /// fully outside rectangle yields no cells.
    #[must_use]
    pub fn covering(rect: &WorldRect, zoom: u8) -> Vec<Self> {
        let last = Self::cells_per_side(zoom) - 1;
        let max = rect.max();
        if max.x <= 0.0 || max.y <= 0.0 || rect.origin.x >= WORLD_SIZE || rect.origin.y >= WORLD_SIZE
        {
            return Vec::new();
        }

        let first = Self::containing(rect.origin, zoom);
        // The max corner is exclusive; nudge inward so a rect ending on a
        // cell boundary does not pull in the next row/column.
        let side = Self::side(zoom);
        let last_cell = Self::containing(
            WorldPoint::new(max.x - side * 1e-9, max.y - side * 1e-9),
            zoom,
        );

        let mut cells = Vec::new();
        for y in first.y.max(0)..=last_cell.y.min(last) {
            for x in first.x.max(0)..=last_cell.x.min(last) {
                cells.push(Self::new(zoom, x, y));
            }
        }
        cells
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_rect_tiles_the_plane() {
        // At zoom 1 the four cells partition the world exactly.
        let cells: Vec<CellKey> = (0..2)
            .flat_map(|y| (0..2).map(move |x| CellKey::new(1, x, y)))
            .collect();
        let total: f64 = cells
            .iter()
            .map(|c| {
                let r = c.world_rect();
                r.dimension.x * r.dimension.y
            })
            .sum();
        assert!((total - WORLD_SIZE * WORLD_SIZE).abs() < 1e-9);
    }

    #[test]
    fn test_containing_respects_boundaries() {
        let side = CellKey::side(2);
        assert_eq!(
            CellKey::containing(WorldPoint::new(0.0, 0.0), 2),
            CellKey::new(2, 0, 0)
        );
        assert_eq!(
            CellKey::containing(WorldPoint::new(side, 0.0), 2),
            CellKey::new(2, 1, 0)
        );
        // Outside the plane clamps to the border.
        assert_eq!(
            CellKey::containing(WorldPoint::new(-10.0, 1e9), 2),
            CellKey::new(2, 0, 3)
        );
    }

    #[test]
    fn test_parent_child_roundtrip() {
        let cell = CellKey::new(5, 13, 22);
        for child in cell.children() {
            assert_eq!(child.parent(), Some(cell));
        }
        assert_eq!(CellKey::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_covering_viewport_sized_rect() {
        // A rect exactly covering one zoom-2 cell yields that one cell.
        let cell = CellKey::new(2, 1, 2);
        let cells = CellKey::covering(&cell.world_rect(), 2);
        assert_eq!(cells, vec![cell]);

        // Shifting the rect by half a cell pulls in the neighbours.
        let side = CellKey::side(2);
        let mut rect = cell.world_rect();
        rect.origin.x += side / 2.0;
        let cells = CellKey::covering(&rect, 2);
        assert_eq!(cells, vec![cell, CellKey::new(2, 2, 2)]);
    }

    #[test]
    fn test_covering_clips_to_plane() {
        let rect = WorldRect::new(
            WorldPoint::new(-1000.0, -1000.0),
            WorldPoint::new(4000.0, 4000.0),
        );
        let cells = CellKey::covering(&rect, 1);
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(CellKey::new(3, 1, 2).to_string(), "3/1/2");
    }
}
