//! # Map Engine Assembly
//!
//! Wires configuration and collaborators into the controller with the
//! fixed system order, owns the camera and singleton entities, and
//! responds to the host animation clock. The order registered here is a
//! hard contract: input before camera, geocoding before location
//! initialization, requests before loading before removal, placement
//! before rendering, the microtask drain last.

use std::sync::Arc;

use meridian_core::{
    BackgroundExecutor, CooperativeExecutor, EcsController, EcsManager, EcsSystem, EngineError,
    EngineResult, EntityId, ErrorSink, MicroTaskExecutor,
};
use meridian_geo::{
    MapProjection, MercatorProjection, ScreenPoint, ScreenRect, Viewport, WorldPoint, MIN_ZOOM,
    WORLD_SIZE,
};
use meridian_tiles::{PayloadCache, RetryPolicy, TileLoader, TileProvider};

use crate::camera::{
    CameraComponent, CameraInputSystem, CameraScaleEffectSystem, CameraUpdateComponent,
    CameraUpdateSystem, ViewportUpdateSystem,
};
use crate::cells::{CellStateComponent, CellStateUpdateSystem};
use crate::config::{EngineConfig, ExecutorMode};
use crate::context::EngineContext;
use crate::diagnostics::{DiagnosticsSystem, EngineMetrics};
use crate::fragments::{
    FragmentDecoder, FragmentDownloadingSystem, FragmentEmitSystem, FragmentStateComponent,
    FragmentUpdateSystem, FragmentsRemovingSystem, GeoPolylines, RegionComponent,
};
use crate::geocoding::{
    GeocodingProvider, GeocodingService, GeocodingSystem, InitialLocation,
    MapLocationInitializationSystem, NullGeocodingProvider,
};
use crate::input::{ClickableComponent, MouseEvent, MouseInputComponent, MouseInputSystem};
use crate::layers::{init_layers, LayerProvider};
use crate::render::{DiscardBackend, RenderBackend, RenderingTaskSystem, WorldToScreenSystem};
use crate::scheduler::SchedulerSystem;
use crate::tiles::{TileDecoder, TileLoadingSystem, TileRemovingSystem, TileRequestSystem};

/// Builder for [`MapEngine`].
///
/// Providers for tiles are mandatory; every other collaborator has a
/// workable default (discarding backend, failing geocoder, empty
/// fragment stream).
pub struct MapEngineBuilder {
    config: EngineConfig,
    viewport_size: ScreenPoint,
    projection: Arc<dyn MapProjection>,
    tile_provider: Option<Arc<dyn TileProvider>>,
    tile_decoder: Option<Arc<dyn TileDecoder>>,
    fragment_provider: Option<Arc<dyn TileProvider>>,
    fragment_decoder: Option<Arc<dyn FragmentDecoder>>,
    geocoder: Arc<dyn GeocodingProvider>,
    layer_provider: Option<Box<dyn LayerProvider>>,
    backend: Box<dyn RenderBackend>,
    retry: RetryPolicy,
    initial_location: InitialLocation,
}

impl MapEngineBuilder {
    /// Starts a builder for the given viewport size in pixels.
    #[must_use]
    pub fn new(viewport_size: ScreenPoint) -> Self {
        Self {
            config: EngineConfig::default(),
            viewport_size,
            projection: Arc::new(MercatorProjection),
            tile_provider: None,
            tile_decoder: None,
            fragment_provider: None,
            fragment_decoder: None,
            geocoder: Arc::new(NullGeocodingProvider),
            layer_provider: None,
            backend: Box::new(DiscardBackend),
            retry: RetryPolicy::default(),
            initial_location: InitialLocation::Default,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the map projection.
    #[must_use]
    pub fn projection(mut self, projection: Arc<dyn MapProjection>) -> Self {
        self.projection = projection;
        self
    }

    /// Sets the basemap tile provider (required).
    #[must_use]
    pub fn tile_provider(mut self, provider: Arc<dyn TileProvider>) -> Self {
        self.tile_provider = Some(provider);
        self
    }

    /// Sets the basemap tile decoder (required).
    #[must_use]
    pub fn tile_decoder(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.tile_decoder = Some(decoder);
        self
    }

    /// Sets the vector fragment provider.
    #[must_use]
    pub fn fragment_provider(mut self, provider: Arc<dyn TileProvider>) -> Self {
        self.fragment_provider = Some(provider);
        self
    }

    /// Sets the vector fragment decoder.
    #[must_use]
    pub fn fragment_decoder(mut self, decoder: Arc<dyn FragmentDecoder>) -> Self {
        self.fragment_decoder = Some(decoder);
        self
    }

    /// Sets the geocoding provider.
    #[must_use]
    pub fn geocoding_provider(mut self, provider: Arc<dyn GeocodingProvider>) -> Self {
        self.geocoder = provider;
        self
    }

    /// Sets the layer provider.
    #[must_use]
    pub fn layer_provider(mut self, provider: Box<dyn LayerProvider>) -> Self {
        self.layer_provider = Some(provider);
        self
    }

    /// Sets the render backend.
    #[must_use]
    pub fn backend(mut self, backend: Box<dyn RenderBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the download retry policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets where the camera starts.
    #[must_use]
    pub fn initial_location(mut self, initial: InitialLocation) -> Self {
        self.initial_location = initial;
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for invalid configuration
    /// or missing mandatory collaborators.
    pub fn build(self) -> EngineResult<MapEngine> {
        self.config.validate()?;

        let tile_provider = self
            .tile_provider
            .ok_or_else(|| EngineError::Configuration("tile provider is required".into()))?;
        let tile_decoder = self
            .tile_decoder
            .ok_or_else(|| EngineError::Configuration("tile decoder is required".into()))?;
        let fragment_provider = self
            .fragment_provider
            .unwrap_or_else(|| Arc::new(EmptyFragmentProvider));
        let fragment_decoder: Arc<dyn FragmentDecoder> = self
            .fragment_decoder
            .unwrap_or_else(|| Arc::new(EmptyFragmentDecoder));

        let (errors, error_sink) = ErrorSink::channel();

        let tile_loader = TileLoader::new(
            tile_provider,
            self.config.active_download_limit,
            self.retry,
        )?;
        let fragment_loader = TileLoader::new(
            fragment_provider,
            self.config.active_download_limit,
            self.retry,
        )?;

        let executor: Box<dyn MicroTaskExecutor<crate::scheduler::Computation>> =
            match self.config.executor {
                ExecutorMode::Cooperative => {
                    Box::new(CooperativeExecutor::new(self.config.computation_budget_ms))
                }
                ExecutorMode::Background => {
                    Box::new(BackgroundExecutor::new(self.config.background_workers))
                }
            };

        let geocoder = GeocodingService::new(self.geocoder)?;

        let mut world = EcsManager::new();
        let camera = world
            .spawn("camera")
            .with(CameraComponent {
                zoom: MIN_ZOOM,
                position: WorldPoint::new(WORLD_SIZE / 2.0, WORLD_SIZE / 2.0),
            })
            .with(CameraUpdateComponent::default())
            .with(MouseInputComponent::default())
            .with(ClickableComponent {
                area: ScreenRect::new(ScreenPoint::new(0.0, 0.0), self.viewport_size),
            })
            .id();
        world
            .spawn("cell_state")
            .with(CellStateComponent::default())
            .id();
        world
            .spawn("fragment_state")
            .with(FragmentStateComponent::default())
            .id();
        init_layers(&mut world, &self.config, self.layer_provider.as_deref());

        let ctx = EngineContext {
            viewport: Viewport::new(self.viewport_size),
            projection: self.projection,
            errors,
            mouse_events: std::collections::VecDeque::new(),
            tile_loader,
            tile_decoder,
            tile_cache: PayloadCache::new(),
            fragment_loader,
            fragment_decoder,
            fragment_cache: PayloadCache::new(),
            executor,
            geocoder,
            backend: self.backend,
            metrics: EngineMetrics::default(),
            config: self.config,
        };

        let systems: Vec<Box<dyn EcsSystem<EngineContext>>> = vec![
            // Input
            Box::new(MouseInputSystem),
            Box::new(CameraInputSystem),
            // Geocoding and location
            Box::new(GeocodingSystem),
            Box::new(MapLocationInitializationSystem::new(self.initial_location)),
            // Camera
            Box::new(CameraUpdateSystem),
            Box::new(CameraScaleEffectSystem),
            Box::new(ViewportUpdateSystem),
            // Cells and tiles
            Box::new(CellStateUpdateSystem),
            Box::new(TileRequestSystem),
            Box::new(TileLoadingSystem),
            Box::new(TileRemovingSystem),
            // Fragments
            Box::new(FragmentUpdateSystem),
            Box::new(FragmentDownloadingSystem),
            Box::new(FragmentEmitSystem),
            Box::new(FragmentsRemovingSystem),
            // Placement and rendering
            Box::new(WorldToScreenSystem),
            Box::new(RenderingTaskSystem),
            Box::new(DiagnosticsSystem),
            // Microtask drain runs last
            Box::new(SchedulerSystem),
        ];

        Ok(MapEngine {
            controller: EcsController::new(world, systems),
            ctx,
            error_sink,
            camera,
            pending_ms: 0.0,
        })
    }
}

/// Fragment provider used when the host supplies none.
struct EmptyFragmentProvider;

impl TileProvider for EmptyFragmentProvider {
    fn fetch(
        &self,
        _cell: meridian_tiles::CellKey,
    ) -> futures::future::BoxFuture<'static, EngineResult<Vec<u8>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Fragment decoder used when the host supplies none.
struct EmptyFragmentDecoder;

impl FragmentDecoder for EmptyFragmentDecoder {
    fn decode(
        &self,
        _cell: meridian_tiles::CellKey,
        _bytes: &[u8],
    ) -> EngineResult<GeoPolylines> {
        Ok(Vec::new())
    }
}

/// The interactive map engine.
///
/// A passive responder: the host animation clock calls
/// [`MapEngine::on_tick`], input arrives through
/// [`MapEngine::dispatch_mouse_event`], and failures surface through
/// [`MapEngine::take_errors`].
pub struct MapEngine {
    controller: EcsController<EngineContext>,
    ctx: EngineContext,
    error_sink: ErrorSink,
    camera: EntityId,
    pending_ms: f64,
}

impl MapEngine {
    /// Starts building an engine for the given viewport size.
    #[must_use]
    pub fn builder(viewport_size: ScreenPoint) -> MapEngineBuilder {
        MapEngineBuilder::new(viewport_size)
    }

    /// Advances the engine by one host clock tick.
    ///
    /// Applies the configured time multiplier and update pause; never
    /// blocks on I/O. Returns `false` once a fatal error has been
    /// reported, signalling the host to stop the clock.
    pub fn on_tick(&mut self, elapsed_ms: f64) -> bool {
        self.pending_ms += elapsed_ms;
        #[allow(clippy::cast_precision_loss)]
        let pause = self.ctx.config.update_pause_ms as f64;
        if pause > 0.0 && self.pending_ms < pause {
            // Coalesce ticks arriving faster than the configured pause.
            return !self.error_sink.fatal_seen();
        }

        let dt = self.pending_ms * self.ctx.config.update_time_multiplier;
        self.pending_ms = 0.0;

        let report = self.controller.update(&mut self.ctx, dt);
        if self.ctx.config.perf_stats {
            self.ctx.metrics.slowest_system = report.slowest_system;
            self.ctx.metrics.slowest_system_ms = report.slowest_ms;
        }

        !self.error_sink.fatal_seen()
    }

    /// Queues a mouse event for delivery at the next tick.
    pub fn dispatch_mouse_event(&mut self, event: MouseEvent) {
        self.ctx.mouse_events.push_back(event);
    }

    /// Requests an animated change to the given zoom level.
    pub fn request_zoom(&mut self, zoom: f64) {
        if let Some(update) = self
            .controller
            .world_mut()
            .get_component_mut::<CameraUpdateComponent>(self.camera)
        {
            update.requested_zoom = Some(zoom);
        }
    }

    /// Requests an animated move to the given world position.
    pub fn request_position(&mut self, position: WorldPoint) {
        if let Some(update) = self
            .controller
            .world_mut()
            .get_component_mut::<CameraUpdateComponent>(self.camera)
        {
            update.requested_position = Some(position);
        }
    }

    /// Adds a region entity streaming vector fragments.
    pub fn add_region(&mut self, region_id: &str) -> EntityId {
        self.controller
            .world_mut()
            .spawn(&format!("region_{region_id}"))
            .with(RegionComponent {
                region_id: region_id.to_owned(),
            })
            .id()
    }

    /// Drains all errors reported since the last call.
    pub fn take_errors(&mut self) -> Vec<EngineError> {
        self.error_sink.drain()
    }

    /// Current camera zoom.
    #[must_use]
    pub fn camera_zoom(&self) -> f64 {
        self.controller
            .world()
            .get_component::<CameraComponent>(self.camera)
            .map_or(MIN_ZOOM, |c| c.zoom)
    }

    /// Current camera center.
    #[must_use]
    pub fn camera_position(&self) -> WorldPoint {
        self.controller
            .world()
            .get_component::<CameraComponent>(self.camera)
            .map_or_else(WorldPoint::default, |c| c.position)
    }

    /// The live viewport.
    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.ctx.viewport
    }

    /// Diagnostics counters.
    #[must_use]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.ctx.metrics
    }

    /// Read access to the world, for hosts and tests.
    #[must_use]
    pub fn world(&self) -> &EcsManager {
        self.controller.world()
    }

    /// Registered system names in execution order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&'static str> {
        self.controller.system_names()
    }
}
