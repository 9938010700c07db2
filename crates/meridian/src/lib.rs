//! # MERIDIAN
//!
//! An entity-component interactive map rendering engine: pannable,
//! zoomable map views driven by a fixed-order system schedule, with
//! asynchronous tile/fragment streaming, cooperative computation
//! scheduling and an error side channel that keeps the frame loop alive
//! through per-cell failures.
//!
//! ## Shape
//!
//! - [`MapEngine`] is a passive responder: the host clock calls
//!   [`MapEngine::on_tick`], input arrives through
//!   [`MapEngine::dispatch_mouse_event`]
//! - Collaborators stay behind traits: tile/fragment providers and
//!   decoders, geocoding, layers, the render backend
//! - One immutable [`EngineConfig`] is read at construction
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian::{EngineConfig, MapEngine};
//! use meridian_geo::ScreenPoint;
//!
//! let mut engine = MapEngine::builder(ScreenPoint::new(800.0, 600.0))
//!     .config(EngineConfig::default())
//!     .tile_provider(my_provider)
//!     .tile_decoder(my_decoder)
//!     .build()?;
//!
//! // Host animation loop:
//! while engine.on_tick(16.0) { /* present */ }
//! ```

pub mod camera;
pub mod cells;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod fragments;
pub mod geocoding;
pub mod input;
pub mod layers;
pub mod render;
pub mod scheduler;
pub mod tiles;

pub use meridian_core::{EngineError, EngineResult};

pub use camera::{CameraComponent, CameraScaleEffectComponent, CameraUpdateComponent};
pub use cells::{CellLayerKind, CellStateComponent};
pub use config::{EngineConfig, ExecutorMode};
pub use context::EngineContext;
pub use diagnostics::EngineMetrics;
pub use engine::{MapEngine, MapEngineBuilder};
pub use fragments::{FragmentDecoder, GeoPolylines, RegionComponent};
pub use geocoding::{GeocodedResult, GeocodingProvider, InitialLocation};
pub use input::{MouseEvent, MouseEventKind};
pub use layers::{LayerGroup, LayerProvider, LayerSpec};
pub use render::{Bitmap, RenderBackend, RenderJob, RenderPrimitive};
pub use scheduler::Computation;
pub use tiles::TileDecoder;
