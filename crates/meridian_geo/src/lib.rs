//! # MERIDIAN Geo
//!
//! Pure coordinate mathematics for the map engine. Three coordinate
//! spaces, kept apart by the type system:
//!
//! - **Geographic**: longitude/latitude degrees ([`GeoPoint`])
//! - **World**: the projected plane, `WORLD_SIZE` units square at zoom 0
//!   ([`WorldPoint`], [`WorldRect`])
//! - **Screen**: viewport pixels ([`ScreenPoint`], [`ScreenRect`])
//!
//! Projections map geographic to world space; the [`Viewport`] maps world
//! to screen space from current camera state. Nothing in this crate is
//! cached across state changes.

pub mod point;
pub mod projection;
pub mod rect;
pub mod simplify;
pub mod viewport;

pub use point::{GeoPoint, ScreenPoint, WorldPoint, WORLD_SIZE};
pub use projection::{EquirectangularProjection, MapProjection, MercatorProjection};
pub use rect::{ScreenRect, WorldRect};
pub use viewport::{Viewport, MAX_ZOOM, MIN_ZOOM};
