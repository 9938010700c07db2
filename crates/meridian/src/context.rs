//! # Engine Context
//!
//! Shared services handed to every system each tick, alongside the
//! world. Everything mutable in here is owned by the frame thread; the
//! loaders and the geocoder push results in through channels that
//! systems drain, never the other way around.

use std::sync::Arc;

use meridian_core::{ErrorReporter, MicroTaskExecutor};
use meridian_geo::{MapProjection, Viewport};
use meridian_tiles::{PayloadCache, TileLoader};

use crate::config::EngineConfig;
use crate::diagnostics::EngineMetrics;
use crate::fragments::{FragmentDecoder, GeoPolylines};
use crate::geocoding::GeocodingService;
use crate::input::MouseEventQueue;
use crate::render::{Bitmap, RenderBackend};
use crate::scheduler::Computation;
use crate::tiles::TileDecoder;

/// Per-engine shared services.
///
/// Passed as `&mut` to every system; systems communicate across the
/// tick through components, and with the outside world through the
/// services here.
pub struct EngineContext {
    /// The immutable configuration.
    pub config: EngineConfig,
    /// Current view state; mirrored from the camera singleton each tick.
    pub viewport: Viewport,
    /// The active map projection.
    pub projection: Arc<dyn MapProjection>,
    /// Error side channel to the host.
    pub errors: ErrorReporter,
    /// Host-pushed mouse events awaiting delivery.
    pub mouse_events: MouseEventQueue,
    /// Basemap tile fetcher.
    pub tile_loader: TileLoader,
    /// Basemap tile decoder collaborator.
    pub tile_decoder: Arc<dyn TileDecoder>,
    /// Decoded basemap payloads.
    pub tile_cache: PayloadCache<Bitmap>,
    /// Vector fragment fetcher.
    pub fragment_loader: TileLoader,
    /// Vector fragment decoder collaborator.
    pub fragment_decoder: Arc<dyn FragmentDecoder>,
    /// Decoded fragment geometry.
    pub fragment_cache: PayloadCache<GeoPolylines>,
    /// Microtask executor behind the strategy seam.
    pub executor: Box<dyn MicroTaskExecutor<Computation>>,
    /// Asynchronous geocoding service.
    pub geocoder: GeocodingService,
    /// Render backend collaborator.
    pub backend: Box<dyn RenderBackend>,
    /// Diagnostics counters.
    pub metrics: EngineMetrics,
}

#[cfg(test)]
pub mod test_support {
    //! Context wiring for system-level unit tests: immediate stub
    //! providers, a discarding backend and a cooperative executor.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use meridian_core::{CooperativeExecutor, EngineResult, ErrorSink};
    use meridian_geo::{GeoPoint, MercatorProjection, ScreenPoint, Viewport};
    use meridian_tiles::{CellKey, PayloadCache, RetryPolicy, TileLoader, TileProvider};

    use super::EngineContext;
    use crate::config::EngineConfig;
    use crate::diagnostics::EngineMetrics;
    use crate::fragments::{FragmentDecoder, GeoPolylines};
    use crate::geocoding::{GeocodingService, NullGeocodingProvider};
    use crate::render::{Bitmap, DiscardBackend};
    use crate::tiles::TileDecoder;

    /// Provider returning one byte per request, counting fetches.
    pub struct CountingStubProvider {
        fetches: Arc<AtomicU32>,
    }

    impl TileProvider for CountingStubProvider {
        fn fetch(&self, cell: CellKey) -> BoxFuture<'static, EngineResult<Vec<u8>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(vec![cell.zoom]) })
        }
    }

    struct StubTileDecoder;

    impl TileDecoder for StubTileDecoder {
        fn decode(&self, _cell: CellKey, bytes: &[u8]) -> EngineResult<Bitmap> {
            Ok(Bitmap {
                width: 1,
                height: 1,
                pixels: bytes.to_vec(),
            })
        }
    }

    struct StubFragmentDecoder;

    impl FragmentDecoder for StubFragmentDecoder {
        fn decode(&self, _cell: CellKey, _bytes: &[u8]) -> EngineResult<GeoPolylines> {
            Ok(vec![vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]])
        }
    }

    fn build(fetches: Arc<AtomicU32>) -> (EngineContext, ErrorSink) {
        let config = EngineConfig::default();
        let (errors, sink) = ErrorSink::channel();

        let tile_loader = TileLoader::new(
            Arc::new(CountingStubProvider {
                fetches: Arc::clone(&fetches),
            }),
            config.active_download_limit,
            RetryPolicy::default(),
        )
        .expect("test tile loader");
        let fragment_loader = TileLoader::new(
            Arc::new(CountingStubProvider { fetches }),
            config.active_download_limit,
            RetryPolicy::default(),
        )
        .expect("test fragment loader");

        let ctx = EngineContext {
            viewport: Viewport::new(ScreenPoint::new(800.0, 600.0)),
            projection: Arc::new(MercatorProjection),
            errors,
            mouse_events: std::collections::VecDeque::new(),
            tile_loader,
            tile_decoder: Arc::new(StubTileDecoder),
            tile_cache: PayloadCache::new(),
            fragment_loader,
            fragment_decoder: Arc::new(StubFragmentDecoder),
            fragment_cache: PayloadCache::new(),
            executor: Box::new(CooperativeExecutor::new(config.computation_budget_ms)),
            geocoder: GeocodingService::new(Arc::new(NullGeocodingProvider))
                .expect("test geocoder"),
            backend: Box::new(DiscardBackend),
            metrics: EngineMetrics::default(),
            config,
        };
        (ctx, sink)
    }

    /// A context with stub collaborators; errors are discarded.
    #[must_use]
    pub fn test_context() -> EngineContext {
        build(Arc::new(AtomicU32::new(0))).0
    }

    /// A context plus the error sink its reporter feeds.
    #[must_use]
    pub fn test_context_with_errors() -> (EngineContext, ErrorSink) {
        build(Arc::new(AtomicU32::new(0)))
    }

    /// A context plus the tile-provider fetch counter.
    #[must_use]
    pub fn test_context_with_tile_counter() -> (EngineContext, Arc<AtomicU32>) {
        let fetches = Arc::new(AtomicU32::new(0));
        let (ctx, _sink) = build(Arc::clone(&fetches));
        (ctx, fetches)
    }
}
