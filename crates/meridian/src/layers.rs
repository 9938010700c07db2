//! # Layer Registry
//!
//! Layers are entities carrying a [`LayerComponent`] plus a
//! [`CellLayerComponent`] naming the cell stream they render. The static
//! set is fixed at engine construction: engine-owned basemap layers per
//! the configured tile mode, plus whatever the layer provider
//! collaborator supplies.

use meridian_core::{Component, EcsManager};

use crate::cells::{CellLayerComponent, CellLayerKind};
use crate::config::EngineConfig;

/// Draw-order grouping; groups render back to front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerGroup {
    /// Basemap content.
    Background,
    /// Overlays: labels, regions, debug grid.
    Foreground,
    /// Host chrome above everything.
    Ui,
}

/// Identity and ordering of one layer entity.
#[derive(Clone, Debug)]
pub struct LayerComponent {
    /// Layer name, for diagnostics and backend routing.
    pub name: String,
    /// Draw-order group.
    pub group: LayerGroup,
    /// Order within the group; lower draws first.
    pub order: u32,
}

impl Component for LayerComponent {
    const NAME: &'static str = "Layer";
}

/// One layer requested by the layer provider collaborator.
#[derive(Clone, Debug)]
pub struct LayerSpec {
    /// Layer name.
    pub name: String,
    /// Draw-order group.
    pub group: LayerGroup,
    /// Cell stream the layer renders.
    pub kind: CellLayerKind,
}

/// Supplies the static layer set at startup.
///
/// Pure construction-time collaborator; not part of the runtime loop.
pub trait LayerProvider {
    /// Layers to create in addition to the engine's basemap layers.
    fn provide(&self) -> Vec<LayerSpec>;
}

/// Creates the engine's layer entities.
///
/// Vector mode gets `ground` (world geometry) and `labels`; raster mode
/// gets a bitmap `ground` plus a `overlay` world layer so region
/// geometry still renders. The debug grid layer exists only when
/// configured.
pub fn init_layers(
    world: &mut EcsManager,
    config: &EngineConfig,
    provider: Option<&dyn LayerProvider>,
) {
    let mut order = 0_u32;
    let mut add = |world: &mut EcsManager, name: &str, group: LayerGroup, kind: CellLayerKind| {
        world
            .spawn(name)
            .with(LayerComponent {
                name: name.to_owned(),
                group,
                order,
            })
            .with(CellLayerComponent { kind })
            .id();
        order += 1;
    };

    if config.raster_tiles {
        add(world, "ground", LayerGroup::Background, CellLayerKind::Raster);
        add(world, "overlay", LayerGroup::Background, CellLayerKind::World);
    } else {
        add(world, "ground", LayerGroup::Background, CellLayerKind::World);
        add(world, "labels", LayerGroup::Foreground, CellLayerKind::Label);
    }

    if config.debug_grid {
        add(world, "debug", LayerGroup::Foreground, CellLayerKind::Debug);
    }

    if let Some(provider) = provider {
        for spec in provider.provide() {
            add(world, &spec.name, spec.group, spec.kind);
        }
    }
}
