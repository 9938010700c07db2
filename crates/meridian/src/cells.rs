//! # Cell Visibility Tracking
//!
//! Each tick the visible cell set is recomputed from the viewport and
//! diffed against the previous tick's set. Downstream request/removal
//! systems consume the diff in the same tick.

use std::collections::{BTreeSet, HashMap};

use meridian_core::{Component, EcsManager, EcsSystem, EngineError, EntityId};
use meridian_tiles::CellKey;

use crate::context::EngineContext;

/// Which cell-data stream a layer renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellLayerKind {
    /// Raster basemap bitmaps.
    Raster,
    /// Vector ground geometry.
    World,
    /// Vector label geometry.
    Label,
    /// Debug grid outlines.
    Debug,
}

/// Marks a layer entity as rendering one cell stream.
#[derive(Clone, Copy, Debug)]
pub struct CellLayerComponent {
    /// The stream this layer renders.
    pub kind: CellLayerKind,
}

impl Component for CellLayerComponent {
    const NAME: &'static str = "CellLayer";
}

/// The cell address a per-cell entity represents.
#[derive(Clone, Copy, Debug)]
pub struct CellComponent {
    /// The quadtree address.
    pub cell: CellKey,
}

impl Component for CellComponent {
    const NAME: &'static str = "Cell";
}

/// Singleton visibility state, rewritten every tick.
#[derive(Debug, Default)]
pub struct CellStateComponent {
    /// Cells currently visible.
    pub visible: BTreeSet<CellKey>,
    /// Cells that became visible this tick.
    pub to_request: Vec<CellKey>,
    /// Cells that left visibility this tick.
    pub to_remove: Vec<CellKey>,
    /// Live cell entity per address.
    pub entities: HashMap<CellKey, EntityId>,
}

impl Component for CellStateComponent {
    const NAME: &'static str = "CellState";
}

/// Recomputes the visible cell set from the viewport and records the
/// diff for the request/removal systems.
pub struct CellStateUpdateSystem;

impl EcsSystem<EngineContext> for CellStateUpdateSystem {
    fn name(&self) -> &'static str {
        "cell_state_update"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let state_id = match world.get_singleton::<CellStateComponent>() {
            Ok(id) => id,
            Err(error) => {
                ctx.errors.report(error);
                return;
            }
        };

        // Cells live on integral zoom levels; the camera animates
        // fractionally between them.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cell_zoom = ctx.viewport.zoom().round().max(0.0) as u8;
        let rect = ctx.viewport.visible_world_rect();
        let now_visible: BTreeSet<CellKey> = CellKey::covering(&rect, cell_zoom).into_iter().collect();

        let Some(state) = world.get_component_mut::<CellStateComponent>(state_id) else {
            ctx.errors.report(EngineError::InternalInvariant(
                "cell state singleton lost its component".into(),
            ));
            return;
        };

        state.to_request = now_visible.difference(&state.visible).copied().collect();
        state.to_remove = state.visible.difference(&now_visible).copied().collect();
        state.visible = now_visible;

        ctx.metrics.cells_visible = state.visible.len();
    }
}
