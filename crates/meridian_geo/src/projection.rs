//! # Map Projections
//!
//! Geographic to world-plane mappings. The supplied set is closed:
//! Web Mercator for slippy-map tiles and equirectangular for flat data.

use crate::point::{GeoPoint, WorldPoint, WORLD_SIZE};

/// Latitude bound of the Web Mercator projection, degrees.
///
/// Beyond this latitude the projection diverges; inputs are clamped.
pub const MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// A geographic-to-world mapping.
///
/// Implementations are pure: no state, no caching, `invert` undoes
/// `project` up to floating-point error.
pub trait MapProjection: Send + Sync {
    /// Maps a geographic point onto the world plane.
    fn project(&self, p: GeoPoint) -> WorldPoint;

    /// Maps a world-plane point back to geographic space.
    fn invert(&self, p: WorldPoint) -> GeoPoint;
}

/// Web Mercator, the slippy-map standard.
#[derive(Clone, Copy, Debug, Default)]
pub struct MercatorProjection;

impl MapProjection for MercatorProjection {
    fn project(&self, p: GeoPoint) -> WorldPoint {
        let lat = p.lat.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE);
        let lat_rad = lat.to_radians();

        let x = (p.lon + 180.0) / 360.0 * WORLD_SIZE;
        let y = (1.0 - ((std::f64::consts::FRAC_PI_4 + lat_rad / 2.0).tan()).ln() / std::f64::consts::PI)
            / 2.0
            * WORLD_SIZE;
        WorldPoint::new(x, y)
    }

    fn invert(&self, p: WorldPoint) -> GeoPoint {
        let lon = p.x / WORLD_SIZE * 360.0 - 180.0;
        let n = std::f64::consts::PI * (1.0 - 2.0 * p.y / WORLD_SIZE);
        let lat = n.sinh().atan().to_degrees();
        GeoPoint::new(lon, lat)
    }
}

/// Equirectangular (plate carree) projection.
#[derive(Clone, Copy, Debug, Default)]
pub struct EquirectangularProjection;

impl MapProjection for EquirectangularProjection {
    fn project(&self, p: GeoPoint) -> WorldPoint {
        let x = (p.lon + 180.0) / 360.0 * WORLD_SIZE;
        let y = (90.0 - p.lat) / 180.0 * WORLD_SIZE;
        WorldPoint::new(x, y)
    }

    fn invert(&self, p: WorldPoint) -> GeoPoint {
        let lon = p.x / WORLD_SIZE * 360.0 - 180.0;
        let lat = 90.0 - p.y / WORLD_SIZE * 180.0;
        GeoPoint::new(lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "{a} !~ {b}");
    }

    #[test]
    fn test_mercator_origin_maps_to_center() {
        let p = MercatorProjection.project(GeoPoint::new(0.0, 0.0));
        assert_close(p.x, WORLD_SIZE / 2.0, 1e-9);
        assert_close(p.y, WORLD_SIZE / 2.0, 1e-9);
    }

    #[test]
    fn test_mercator_roundtrip() {
        let original = GeoPoint::new(30.5, -45.25);
        let back = MercatorProjection.invert(MercatorProjection.project(original));
        assert_close(back.lon, original.lon, 1e-9);
        assert_close(back.lat, original.lat, 1e-9);
    }

    #[test]
    fn test_mercator_clamps_polar_latitudes() {
        let pole = MercatorProjection.project(GeoPoint::new(0.0, 90.0));
        let bound = MercatorProjection.project(GeoPoint::new(0.0, MERCATOR_MAX_LATITUDE));
        assert_close(pole.y, bound.y, 1e-9);
        assert!(pole.y.is_finite());
    }

    #[test]
    fn test_equirectangular_corners() {
        let nw = EquirectangularProjection.project(GeoPoint::new(-180.0, 90.0));
        assert_eq!(nw, WorldPoint::new(0.0, 0.0));
        let se = EquirectangularProjection.project(GeoPoint::new(180.0, -90.0));
        assert_eq!(se, WorldPoint::new(WORLD_SIZE, WORLD_SIZE));
    }
}
