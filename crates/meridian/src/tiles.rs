//! # Tile Systems
//!
//! Basemap streaming: the request system turns newly visible cells into
//! cell entities and loader requests; the loading system drains fetch
//! results on the frame thread, decodes them through the collaborator
//! decoder and fills the cache; the removing system releases cells that
//! left visibility and triggers eviction. Request always precedes
//! loading, loading precedes removal, within one tick.

use meridian_core::{Component, EcsManager, EcsSystem, EngineResult, EntityId};
use meridian_tiles::{CellKey, CellState};

use crate::cells::{CellComponent, CellLayerKind, CellStateComponent};
use crate::context::EngineContext;
use crate::render::{Bitmap, RenderContent, RenderableComponent};

/// Per-cell download progress.
#[derive(Clone, Copy, Debug)]
pub struct DownloadStateComponent {
    /// Where the download stands.
    pub state: CellState,
    /// Attempts consumed so far.
    pub attempts: u32,
}

impl Component for DownloadStateComponent {
    const NAME: &'static str = "DownloadState";
}

/// Decodes raw tile bytes into a bitmap.
///
/// Collaborator seam; the engine treats it as a pure function. Fails
/// with [`meridian_core::EngineError::Decode`].
pub trait TileDecoder: Send + Sync {
    /// Decodes one payload.
    ///
    /// # Errors
    ///
    /// Returns [`meridian_core::EngineError::Decode`] for malformed payloads.
    fn decode(&self, cell: CellKey, bytes: &[u8]) -> EngineResult<Bitmap>;
}

fn ground_kind(ctx: &EngineContext) -> CellLayerKind {
    if ctx.config.raster_tiles {
        CellLayerKind::Raster
    } else {
        CellLayerKind::World
    }
}

fn cell_state_singleton(world: &EcsManager, ctx: &mut EngineContext) -> Option<EntityId> {
    match world.get_singleton::<CellStateComponent>() {
        Ok(id) => Some(id),
        Err(error) => {
            ctx.errors.report(error);
            None
        }
    }
}

/// Creates entities and loader requests for newly visible cells.
pub struct TileRequestSystem;

impl EcsSystem<EngineContext> for TileRequestSystem {
    fn name(&self) -> &'static str {
        "tile_request"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(state_id) = cell_state_singleton(world, ctx) else {
            return;
        };
        let to_request = match world.get_component::<CellStateComponent>(state_id) {
            Some(state) => state.to_request.clone(),
            None => return,
        };

        let kind = ground_kind(ctx);
        let mut created = Vec::with_capacity(to_request.len());
        for cell in to_request {
            let entity = world
                .spawn(&format!("cell_{cell}"))
                .with(CellComponent { cell })
                .id();
            created.push((cell, entity));

            if ctx.tile_cache.state(cell) == CellState::Loaded {
                // Cache hit: no download, renderable immediately.
                if let Some(payload) = ctx.tile_cache.retain(cell) {
                    world.add_component(
                        entity,
                        RenderableComponent {
                            layer_kind: kind,
                            content: RenderContent::Bitmap {
                                cell,
                                bitmap: payload,
                            },
                        },
                    );
                }
                world.add_component(
                    entity,
                    DownloadStateComponent {
                        state: CellState::Loaded,
                        attempts: 0,
                    },
                );
            } else {
                ctx.tile_cache.mark_requested(cell);
                let action = ctx.tile_loader.request(cell);
                tracing::debug!(cell = %cell, ?action, "tile requested");
                world.add_component(
                    entity,
                    DownloadStateComponent {
                        state: CellState::Requested,
                        attempts: 0,
                    },
                );
            }
        }

        if let Some(state) = world.get_component_mut::<CellStateComponent>(state_id) {
            state.entities.extend(created);
        }
    }
}

/// Drains loader results, decodes and caches them, and marks cell
/// entities renderable.
pub struct TileLoadingSystem;

impl EcsSystem<EngineContext> for TileLoadingSystem {
    fn name(&self) -> &'static str {
        "tile_loading"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let results = ctx.tile_loader.poll_completed();
        if results.is_empty() {
            return;
        }

        let Some(state_id) = cell_state_singleton(world, ctx) else {
            return;
        };
        let entities = match world.get_component::<CellStateComponent>(state_id) {
            Some(state) => state.entities.clone(),
            None => return,
        };
        let kind = ground_kind(ctx);

        for fetched in results {
            let cell = fetched.cell;
            // Entity may be gone if the cell left visibility while the
            // download was in flight; the payload still lands in the
            // cache, unreferenced.
            let entity = entities
                .get(&cell)
                .copied()
                .filter(|&e| world.is_alive(e));

            let decoded = fetched
                .result
                .and_then(|bytes| ctx.tile_decoder.decode(cell, &bytes));

            match decoded {
                Ok(bitmap) => {
                    ctx.tile_cache.insert_loaded(cell, bitmap);
                    if let Some(entity) = entity {
                        if let Some(payload) = ctx.tile_cache.retain(cell) {
                            world.add_component(
                                entity,
                                RenderableComponent {
                                    layer_kind: kind,
                                    content: RenderContent::Bitmap {
                                        cell,
                                        bitmap: payload,
                                    },
                                },
                            );
                        }
                        world.add_component(
                            entity,
                            DownloadStateComponent {
                                state: CellState::Loaded,
                                attempts: fetched.attempts,
                            },
                        );
                    }
                }
                Err(error) => {
                    // Isolated failure: this cell stays blank, the tick
                    // goes on.
                    ctx.tile_cache.mark_failed(cell);
                    ctx.errors.report(error);
                    if let Some(entity) = entity {
                        world.add_component(
                            entity,
                            DownloadStateComponent {
                                state: CellState::Failed,
                                attempts: fetched.attempts,
                            },
                        );
                    }
                }
            }
        }
    }
}

/// Releases cells leaving visibility and evicts over the cache limit.
pub struct TileRemovingSystem;

impl EcsSystem<EngineContext> for TileRemovingSystem {
    fn name(&self) -> &'static str {
        "tile_removing"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(state_id) = cell_state_singleton(world, ctx) else {
            return;
        };
        let to_remove = match world.get_component::<CellStateComponent>(state_id) {
            Some(state) => state.to_remove.clone(),
            None => return,
        };

        let mut removed_entities: Vec<CellKey> = Vec::new();
        for cell in to_remove {
            let entity = world
                .get_component::<CellStateComponent>(state_id)
                .and_then(|s| s.entities.get(&cell).copied());
            let Some(entity) = entity else {
                continue;
            };

            match world.get_component::<DownloadStateComponent>(entity).map(|d| d.state) {
                Some(CellState::Loaded) => ctx.tile_cache.release(cell),
                Some(CellState::Failed) => ctx.tile_cache.forget(cell),
                // Requested: the in-flight result will arrive after the
                // entity is gone and be discarded against it.
                _ => {}
            }

            world.remove_entity(entity);
            removed_entities.push(cell);
        }

        if let Some(state) = world.get_component_mut::<CellStateComponent>(state_id) {
            for cell in &removed_entities {
                state.entities.remove(cell);
            }
        }

        let evicted = ctx.tile_cache.evict_over_limit(ctx.config.tile_cache_limit);
        ctx.metrics.evictions += evicted.len() as u64;
    }
}
