//! # Rendering Task Systems
//!
//! The engine does not draw; it emits ordered batches of screen-space
//! primitives to the render backend collaborator. Placement (world to
//! screen) runs as its own system so every positional update lands
//! before the batch is built, and screen geometry is recomputed each
//! tick from the live viewport rather than cached across camera moves.

use std::sync::Arc;

use meridian_core::{Component, EcsManager, EcsSystem};
use meridian_geo::{ScreenPoint, ScreenRect, WorldPoint};
use meridian_tiles::CellKey;

use crate::cells::{CellLayerComponent, CellLayerKind, CellStateComponent};
use crate::context::EngineContext;
use crate::layers::{LayerComponent, LayerGroup};

/// A decoded raster payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Packed pixel data; layout is a contract between decoder and
    /// backend.
    pub pixels: Vec<u8>,
}

/// World-space drawable content attached to an entity.
#[derive(Clone, Debug)]
pub enum RenderContent {
    /// A raster tile covering its cell.
    Bitmap {
        /// The cell the bitmap covers.
        cell: CellKey,
        /// Shared decoded payload from the cache.
        bitmap: Arc<Bitmap>,
    },
    /// Projected vector geometry in world coordinates.
    WorldPath {
        /// One or more polylines.
        polylines: Vec<Vec<WorldPoint>>,
    },
}

/// Makes an entity renderable on layers of a matching cell stream.
#[derive(Clone, Debug)]
pub struct RenderableComponent {
    /// Which layers pick this entity up.
    pub layer_kind: CellLayerKind,
    /// What to draw.
    pub content: RenderContent,
}

impl Component for RenderableComponent {
    const NAME: &'static str = "Renderable";
}

/// Screen-space geometry computed by the placement system.
///
/// Overwritten every tick; never carried across camera changes.
#[derive(Clone, Debug)]
pub struct ScreenGeometryComponent {
    /// The primitive to submit.
    pub primitive: RenderPrimitive,
}

impl Component for ScreenGeometryComponent {
    const NAME: &'static str = "ScreenGeometry";
}

/// A drawable primitive in viewport pixels.
#[derive(Clone, Debug)]
pub enum RenderPrimitive {
    /// A bitmap filling a screen rectangle.
    Bitmap {
        /// Destination rectangle.
        rect: ScreenRect,
        /// Shared decoded payload.
        bitmap: Arc<Bitmap>,
    },
    /// Stroked polylines.
    Path {
        /// Screen-space polylines.
        polylines: Vec<Vec<ScreenPoint>>,
    },
    /// A labelled cell outline on the debug grid.
    GridOutline {
        /// Cell bounds on screen.
        rect: ScreenRect,
        /// `zoom/x/y` label.
        label: String,
    },
}

/// One primitive routed to a named layer.
#[derive(Clone, Debug)]
pub struct RenderJob {
    /// Target layer name.
    pub layer: String,
    /// Layer draw group.
    pub group: LayerGroup,
    /// Order within the group.
    pub order: u32,
    /// The primitive.
    pub primitive: RenderPrimitive,
}

/// Consumes the per-tick batch of render jobs.
///
/// Collaborator seam for the SVG/Canvas backends, which are outside the
/// engine.
pub trait RenderBackend: Send {
    /// Draws one tick's ordered batch.
    fn draw(&mut self, batch: &[RenderJob]);
}

/// Backend that draws nothing; for headless hosts and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardBackend;

impl RenderBackend for DiscardBackend {
    fn draw(&mut self, _batch: &[RenderJob]) {}
}

/// Projects every renderable's world content into screen space.
///
/// Runs after all positional/camera systems and before the rendering
/// task system.
pub struct WorldToScreenSystem;

impl EcsSystem<EngineContext> for WorldToScreenSystem {
    fn name(&self) -> &'static str {
        "world_to_screen"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let ids = world.entities_with::<RenderableComponent>();
        for id in ids {
            let Some(renderable) = world.get_component::<RenderableComponent>(id) else {
                continue;
            };

            let primitive = match &renderable.content {
                RenderContent::Bitmap { cell, bitmap } => {
                    let rect = cell.world_rect();
                    let origin = ctx.viewport.get_view_coord(rect.origin);
                    let far = ctx.viewport.get_view_coord(rect.max());
                    RenderPrimitive::Bitmap {
                        rect: ScreenRect::new(origin, far - origin),
                        bitmap: Arc::clone(bitmap),
                    }
                }
                RenderContent::WorldPath { polylines } => RenderPrimitive::Path {
                    polylines: polylines
                        .iter()
                        .map(|line| {
                            line.iter().map(|p| ctx.viewport.get_view_coord(*p)).collect()
                        })
                        .collect(),
                },
            };

            world.add_component(id, ScreenGeometryComponent { primitive });
        }
    }
}

/// Builds the ordered batch and hands it to the backend.
///
/// Walks layers in group/order sequence, collecting the screen geometry
/// of renderables on each layer's cell stream; the debug layer emits an
/// outline per visible cell.
pub struct RenderingTaskSystem;

impl EcsSystem<EngineContext> for RenderingTaskSystem {
    fn name(&self) -> &'static str {
        "rendering_task"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let mut layers: Vec<(LayerGroup, u32, String, CellLayerKind)> = world
            .get_components::<LayerComponent>()
            .filter_map(|(id, layer)| {
                world
                    .get_component::<CellLayerComponent>(id)
                    .map(|cl| (layer.group, layer.order, layer.name.clone(), cl.kind))
            })
            .collect();
        layers.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut batch = Vec::new();
        for (group, order, name, kind) in layers {
            if kind == CellLayerKind::Debug {
                self.emit_debug_grid(world, ctx, &name, group, order, &mut batch);
                continue;
            }

            for (id, renderable) in world.get_components::<RenderableComponent>() {
                if renderable.layer_kind != kind {
                    continue;
                }
                if let Some(geometry) = world.get_component::<ScreenGeometryComponent>(id) {
                    batch.push(RenderJob {
                        layer: name.clone(),
                        group,
                        order,
                        primitive: geometry.primitive.clone(),
                    });
                }
            }
        }

        ctx.metrics.render_jobs = batch.len();
        ctx.backend.draw(&batch);
    }
}

impl RenderingTaskSystem {
    fn emit_debug_grid(
        &self,
        world: &EcsManager,
        ctx: &EngineContext,
        layer: &str,
        group: LayerGroup,
        order: u32,
        batch: &mut Vec<RenderJob>,
    ) {
        let Ok(state_id) = world.get_singleton::<CellStateComponent>() else {
            return;
        };
        let Some(state) = world.get_component::<CellStateComponent>(state_id) else {
            return;
        };

        for cell in &state.visible {
            let rect = cell.world_rect();
            let origin = ctx.viewport.get_view_coord(rect.origin);
            let far = ctx.viewport.get_view_coord(rect.max());
            batch.push(RenderJob {
                layer: layer.to_owned(),
                group,
                order,
                primitive: RenderPrimitive::GridOutline {
                    rect: ScreenRect::new(origin, far - origin),
                    label: cell.to_string(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::test_context;
    use crate::layers::init_layers;

    fn bitmap() -> Arc<Bitmap> {
        Arc::new(Bitmap {
            width: 1,
            height: 1,
            pixels: vec![0xFF],
        })
    }

    #[test]
    fn test_placement_recomputed_after_camera_move() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let cell = CellKey::new(2, 1, 1);
        let id = world
            .spawn("cell")
            .with(RenderableComponent {
                layer_kind: CellLayerKind::Raster,
                content: RenderContent::Bitmap {
                    cell,
                    bitmap: bitmap(),
                },
            })
            .id();

        WorldToScreenSystem.update(&mut world, &mut ctx, 16.0);
        let first = match &world
            .get_component::<ScreenGeometryComponent>(id)
            .unwrap()
            .primitive
        {
            RenderPrimitive::Bitmap { rect, .. } => *rect,
            other => panic!("unexpected primitive: {other:?}"),
        };

        ctx.viewport.set_zoom(ctx.viewport.zoom() + 1.0);
        WorldToScreenSystem.update(&mut world, &mut ctx, 16.0);
        let second = match &world
            .get_component::<ScreenGeometryComponent>(id)
            .unwrap()
            .primitive
        {
            RenderPrimitive::Bitmap { rect, .. } => *rect,
            other => panic!("unexpected primitive: {other:?}"),
        };

        assert_ne!(first, second);
    }

    #[test]
    fn test_batch_respects_layer_order() {
        struct RecordingBackend {
            layers: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        }
        impl RenderBackend for RecordingBackend {
            fn draw(&mut self, batch: &[RenderJob]) {
                let mut layers = self.layers.lock().unwrap();
                layers.extend(batch.iter().map(|j| j.layer.clone()));
            }
        }

        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let layers = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        ctx.backend = Box::new(RecordingBackend {
            layers: std::sync::Arc::clone(&layers),
        });

        init_layers(&mut world, &ctx.config, None);
        // One renderable on each vector layer.
        for kind in [CellLayerKind::Label, CellLayerKind::World] {
            world
                .spawn("feature")
                .with(RenderableComponent {
                    layer_kind: kind,
                    content: RenderContent::WorldPath {
                        polylines: vec![vec![WorldPoint::new(0.0, 0.0), WorldPoint::new(1.0, 1.0)]],
                    },
                })
                .id();
        }

        WorldToScreenSystem.update(&mut world, &mut ctx, 16.0);
        RenderingTaskSystem.update(&mut world, &mut ctx, 16.0);

        // Background ground before foreground labels.
        assert_eq!(*layers.lock().unwrap(), vec!["ground", "labels"]);
        assert_eq!(ctx.metrics.render_jobs, 2);
    }

    #[test]
    fn test_debug_grid_outlines_visible_cells() {
        let mut world = EcsManager::new();
        let ctx = test_context();
        let mut state = CellStateComponent::default();
        state.visible.insert(CellKey::new(1, 0, 0));
        state.visible.insert(CellKey::new(1, 1, 0));
        world.spawn("cell_state").with(state).id();

        let mut batch = Vec::new();
        RenderingTaskSystem.emit_debug_grid(
            &world,
            &ctx,
            "debug",
            LayerGroup::Foreground,
            0,
            &mut batch,
        );
        assert_eq!(batch.len(), 2);
        assert!(matches!(
            batch[0].primitive,
            RenderPrimitive::GridOutline { .. }
        ));
    }
}
