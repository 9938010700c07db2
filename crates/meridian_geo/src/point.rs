//! # Typed Points
//!
//! One point type per coordinate space. Mixing spaces is a compile
//! error; conversions go through a projection or the viewport.

use bytemuck::{Pod, Zeroable};

/// Side length of the world plane at zoom level 0, in world units.
///
/// Cell payloads are rendered at this pixel size, so one world unit maps
/// to one pixel at zoom 0 and doubles per zoom level.
pub const WORLD_SIZE: f64 = 256.0;

/// A point in geographic space: degrees of longitude and latitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GeoPoint {
    /// Longitude in degrees, positive east.
    pub lon: f64,
    /// Latitude in degrees, positive north.
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a geographic point.
    #[inline]
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A point on the projected world plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct WorldPoint {
    /// X coordinate, west to east.
    pub x: f64,
    /// Y coordinate, north to south.
    pub y: f64,
}

impl WorldPoint {
    /// Creates a world point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise midpoint with another world point.
    #[inline]
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl std::ops::Add for WorldPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for WorldPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for WorldPoint {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// A point in viewport space: pixels from the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ScreenPoint {
    /// Horizontal pixel offset.
    pub x: f64,
    /// Vertical pixel offset.
    pub y: f64,
}

impl ScreenPoint {
    /// Creates a screen point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise midpoint with another screen point.
    #[inline]
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl std::ops::Add for ScreenPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for ScreenPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for ScreenPoint {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_point_arithmetic() {
        let a = WorldPoint::new(10.0, 20.0);
        let b = WorldPoint::new(1.0, 2.0);
        assert_eq!(a + b, WorldPoint::new(11.0, 22.0));
        assert_eq!(a - b, WorldPoint::new(9.0, 18.0));
        assert_eq!(b * 3.0, WorldPoint::new(3.0, 6.0));
    }

    #[test]
    fn test_midpoint() {
        let a = ScreenPoint::new(0.0, 0.0);
        let b = ScreenPoint::new(100.0, 50.0);
        assert_eq!(a.midpoint(b), ScreenPoint::new(50.0, 25.0));
    }

    #[test]
    fn test_pod_layout() {
        assert_eq!(std::mem::size_of::<WorldPoint>(), 16);
        assert_eq!(std::mem::size_of::<ScreenPoint>(), 16);
        assert_eq!(std::mem::size_of::<GeoPoint>(), 16);
    }
}
