//! # MERIDIAN Tiles
//!
//! Streaming infrastructure for tiled map data. One [`CellKey`] addresses
//! one quadtree cell; the same key space serves raster tiles and vector
//! fragments. The [`PayloadCache`] tracks the per-cell state machine
//! (`Absent -> Requested -> {Loaded, Failed}`, eviction back to `Absent`),
//! and the [`TileLoader`] runs provider fetches off the frame thread with
//! bounded concurrency and per-cell deduplication.

pub mod cache;
pub mod cell;
pub mod loader;
pub mod queue;

pub use cache::{CellState, PayloadCache};
pub use cell::CellKey;
pub use loader::{FetchResult, RetryPolicy, TileLoader, TileProvider};
pub use queue::{DownloadQueue, RequestAction};
