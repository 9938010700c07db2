//! # Geocoding Systems
//!
//! Region identifiers resolve to centroid/bounds through the geocoding
//! provider collaborator. Resolution is asynchronous: queries run on the
//! service's own runtime, results come back over a channel and are
//! merged into components on the frame thread.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::BoxFuture;
use meridian_core::{Component, EcsManager, EcsSystem, EngineError, EngineResult, EntityId};
use meridian_geo::{GeoPoint, WorldPoint, WorldRect};

use crate::camera::CameraComponent;
use crate::context::EngineContext;

/// A resolved geocoding query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeocodedResult {
    /// Region centroid.
    pub centroid: GeoPoint,
    /// Bounding box corners, if the provider knows them.
    pub bounds: Option<(GeoPoint, GeoPoint)>,
}

/// Resolves region identifiers asynchronously.
pub trait GeocodingProvider: Send + Sync + 'static {
    /// Resolves one query, failing with [`EngineError::Geocoding`].
    fn resolve(&self, query: &str) -> BoxFuture<'static, EngineResult<GeocodedResult>>;
}

/// Provider used when the host configures no geocoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullGeocodingProvider;

impl GeocodingProvider for NullGeocodingProvider {
    fn resolve(&self, query: &str) -> BoxFuture<'static, EngineResult<GeocodedResult>> {
        let query = query.to_owned();
        Box::pin(async move {
            Err(EngineError::Geocoding {
                query,
                reason: "no geocoding provider configured".into(),
            })
        })
    }
}

/// A finished geocoding query.
#[derive(Debug)]
pub struct GeocodeCompletion {
    /// Entity that asked.
    pub entity: EntityId,
    /// The original query.
    pub query: String,
    /// Resolution or failure.
    pub result: EngineResult<GeocodedResult>,
}

/// Async shell around the provider; one runtime, one result channel.
pub struct GeocodingService {
    provider: Arc<dyn GeocodingProvider>,
    runtime: tokio::runtime::Runtime,
    result_tx: Sender<GeocodeCompletion>,
    result_rx: Receiver<GeocodeCompletion>,
    in_flight: usize,
}

impl GeocodingService {
    /// Creates the service.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if the runtime cannot
    /// start.
    pub fn new(provider: Arc<dyn GeocodingProvider>) -> EngineResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("geocoder")
            .enable_time()
            .build()
            .map_err(|e| EngineError::Configuration(format!("geocoding runtime: {e}")))?;
        let (result_tx, result_rx) = unbounded();
        Ok(Self {
            provider,
            runtime,
            result_tx,
            result_rx,
            in_flight: 0,
        })
    }

    /// Dispatches a query on behalf of an entity.
    pub fn submit(&mut self, entity: EntityId, query: &str) {
        self.in_flight += 1;
        let provider = Arc::clone(&self.provider);
        let tx = self.result_tx.clone();
        let query = query.to_owned();
        self.runtime.spawn(async move {
            let result = provider.resolve(&query).await;
            let _ = tx.send(GeocodeCompletion {
                entity,
                query,
                result,
            });
        });
    }

    /// Drains finished queries (non-blocking).
    pub fn poll_completed(&mut self) -> Vec<GeocodeCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.result_rx.try_recv() {
            self.in_flight -= 1;
            completions.push(completion);
        }
        completions
    }

    /// Queries dispatched but not yet completed.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }
}

/// Asks for a region identifier to be geocoded.
#[derive(Clone, Debug)]
pub struct GeocodingRequestComponent {
    /// The region identifier to resolve.
    pub query: String,
    /// Whether the query has been handed to the service.
    pub dispatched: bool,
}

impl GeocodingRequestComponent {
    /// Creates an undispatched request.
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_owned(),
            dispatched: false,
        }
    }
}

impl Component for GeocodingRequestComponent {
    const NAME: &'static str = "GeocodingRequest";
}

/// Projected centroid of a geocoded region.
#[derive(Clone, Copy, Debug)]
pub struct WorldPositionComponent {
    /// Centroid on the world plane.
    pub position: WorldPoint,
}

impl Component for WorldPositionComponent {
    const NAME: &'static str = "WorldPosition";
}

/// Projected bounding box of a geocoded region.
#[derive(Clone, Copy, Debug)]
pub struct WorldBoundsComponent {
    /// Bounds on the world plane.
    pub rect: WorldRect,
}

impl Component for WorldBoundsComponent {
    const NAME: &'static str = "WorldBounds";
}

/// Dispatches pending queries and merges completed ones.
pub struct GeocodingSystem;

impl EcsSystem<EngineContext> for GeocodingSystem {
    fn name(&self) -> &'static str {
        "geocoding"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        // Dispatch new requests.
        let requesters = world.entities_with::<GeocodingRequestComponent>();
        for id in requesters {
            let query = {
                let Some(request) = world.get_component_mut::<GeocodingRequestComponent>(id) else {
                    continue;
                };
                if request.dispatched {
                    continue;
                }
                request.dispatched = true;
                request.query.clone()
            };
            ctx.geocoder.submit(id, &query);
        }

        // Merge completions.
        for completion in ctx.geocoder.poll_completed() {
            if !world.is_alive(completion.entity) {
                continue;
            }
            world.remove_component::<GeocodingRequestComponent>(completion.entity);

            match completion.result {
                Ok(resolved) => {
                    let position = ctx.projection.project(resolved.centroid);
                    world.add_component(completion.entity, WorldPositionComponent { position });
                    if let Some((a, b)) = resolved.bounds {
                        let rect = WorldRect::from_corners(
                            ctx.projection.project(a),
                            ctx.projection.project(b),
                        );
                        world.add_component(completion.entity, WorldBoundsComponent { rect });
                    }
                }
                Err(error) => {
                    ctx.errors.report(error);
                }
            }
        }
    }
}

/// Where the camera should start.
#[derive(Clone, Debug, Default)]
pub enum InitialLocation {
    /// Keep the construction defaults.
    #[default]
    Default,
    /// Start at a zoom level, centered as constructed.
    Zoom {
        /// Target zoom.
        zoom: f64,
    },
    /// Start at a world position.
    Position {
        /// Target center.
        center: WorldPoint,
        /// Optional target zoom.
        zoom: Option<f64>,
    },
    /// Geocode a region and center on its centroid.
    Geocode {
        /// Region identifier to resolve.
        query: String,
        /// Optional target zoom.
        zoom: Option<f64>,
    },
}

/// Issues the initial camera requests once location data is available.
///
/// Runs after geocoding and before the camera update so the first
/// settled frame is already in the right place.
pub struct MapLocationInitializationSystem {
    initial: InitialLocation,
    pending: Option<EntityId>,
    done: bool,
}

impl MapLocationInitializationSystem {
    /// Creates the system for the configured initial location.
    #[must_use]
    pub fn new(initial: InitialLocation) -> Self {
        Self {
            initial,
            pending: None,
            done: false,
        }
    }

    fn request_camera(
        world: &mut EcsManager,
        ctx: &mut EngineContext,
        center: Option<WorldPoint>,
        zoom: Option<f64>,
    ) {
        let camera_id = match world.get_singleton::<CameraComponent>() {
            Ok(id) => id,
            Err(error) => {
                ctx.errors.report(error);
                return;
            }
        };
        if let Some(update) =
            world.get_component_mut::<crate::camera::CameraUpdateComponent>(camera_id)
        {
            if center.is_some() {
                update.requested_position = center;
            }
            if zoom.is_some() {
                update.requested_zoom = zoom;
            }
        }
    }
}

impl EcsSystem<EngineContext> for MapLocationInitializationSystem {
    fn name(&self) -> &'static str {
        "map_location_init"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        if self.done {
            return;
        }

        match &self.initial {
            InitialLocation::Default => {
                self.done = true;
            }
            InitialLocation::Zoom { zoom } => {
                Self::request_camera(world, ctx, None, Some(*zoom));
                self.done = true;
            }
            InitialLocation::Position { center, zoom } => {
                Self::request_camera(world, ctx, Some(*center), *zoom);
                self.done = true;
            }
            InitialLocation::Geocode { query, zoom } => {
                let zoom = *zoom;
                match self.pending {
                    None => {
                        let query = query.clone();
                        let id = world
                            .spawn("initial_location")
                            .with(GeocodingRequestComponent::new(&query))
                            .id();
                        self.pending = Some(id);
                    }
                    Some(id) => {
                        let position = world
                            .get_component::<WorldPositionComponent>(id)
                            .map(|p| p.position);
                        if let Some(position) = position {
                            Self::request_camera(world, ctx, Some(position), zoom);
                            world.remove_entity(id);
                            self.done = true;
                        } else if !world.has_component::<GeocodingRequestComponent>(id) {
                            // The request component is gone without a
                            // position: geocoding failed and was already
                            // reported. Fall back to the defaults.
                            world.remove_entity(id);
                            self.done = true;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{test_context, test_context_with_errors};
    use std::time::{Duration, Instant};

    struct FixedGeocoder;

    impl GeocodingProvider for FixedGeocoder {
        fn resolve(&self, query: &str) -> BoxFuture<'static, EngineResult<GeocodedResult>> {
            let known = query == "midgard";
            let query = query.to_owned();
            Box::pin(async move {
                if known {
                    Ok(GeocodedResult {
                        centroid: GeoPoint::new(10.0, 20.0),
                        bounds: Some((GeoPoint::new(5.0, 15.0), GeoPoint::new(15.0, 25.0))),
                    })
                } else {
                    Err(EngineError::Geocoding {
                        query,
                        reason: "unknown region".into(),
                    })
                }
            })
        }
    }

    fn pump_geocoding(world: &mut EcsManager, ctx: &mut EngineContext, entity: EntityId) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while world.has_component::<GeocodingRequestComponent>(entity)
            && Instant::now() < deadline
        {
            GeocodingSystem.update(world, ctx, 16.0);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_resolution_writes_position_and_bounds() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        ctx.geocoder = GeocodingService::new(Arc::new(FixedGeocoder)).unwrap();

        let id = world
            .spawn("region")
            .with(GeocodingRequestComponent::new("midgard"))
            .id();
        pump_geocoding(&mut world, &mut ctx, id);

        assert!(world.has_component::<WorldPositionComponent>(id));
        assert!(world.has_component::<WorldBoundsComponent>(id));
        let expected = ctx.projection.project(GeoPoint::new(10.0, 20.0));
        let got = world.get_component::<WorldPositionComponent>(id).unwrap();
        assert!((got.position.x - expected.x).abs() < 1e-9);
    }

    #[test]
    fn test_failure_reports_and_clears_request() {
        let mut world = EcsManager::new();
        let (mut ctx, sink) = test_context_with_errors();
        ctx.geocoder = GeocodingService::new(Arc::new(FixedGeocoder)).unwrap();

        let id = world
            .spawn("region")
            .with(GeocodingRequestComponent::new("atlantis"))
            .id();
        pump_geocoding(&mut world, &mut ctx, id);

        assert!(!world.has_component::<WorldPositionComponent>(id));
        let errors = sink.drain();
        assert!(errors
            .iter()
            .any(|e| matches!(e, EngineError::Geocoding { .. })));
    }
}
