//! # Camera Systems
//!
//! The camera is a singleton entity. Input converts gestures into
//! requested state; the update system eases current state toward
//! requested state with a clamp on every zoom write; the scale-effect
//! system drives the double-click zoom animation. Systems re-resolve the
//! camera entity by id each tick and never hold references across
//! ticks.

use meridian_core::{Component, EcsManager, EcsSystem, EngineResult, EntityId};
use meridian_geo::{ScreenPoint, WorldPoint, MAX_ZOOM, MIN_ZOOM};

use crate::context::EngineContext;
use crate::input::{MouseEventKind, MouseInputComponent};

/// Duration of the double-click zoom animation.
const SCALE_EFFECT_DURATION_MS: f64 = 300.0;

/// Time constant of the exponential approach toward requested state.
const SMOOTHING_MS: f64 = 120.0;

/// Zoom settles once within this distance of the target.
const ZOOM_SNAP: f64 = 1e-3;

/// Current camera state; the single source for every positional system.
#[derive(Clone, Copy, Debug)]
pub struct CameraComponent {
    /// Zoom level, always within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
    /// View center on the world plane.
    pub position: WorldPoint,
}

impl Component for CameraComponent {
    const NAME: &'static str = "Camera";
}

/// Desired camera state, consumed by the update system.
#[derive(Clone, Copy, Debug, Default)]
pub struct CameraUpdateComponent {
    /// Requested zoom, cleared once settled.
    pub requested_zoom: Option<f64>,
    /// Requested center, cleared once settled.
    pub requested_position: Option<WorldPoint>,
}

impl Component for CameraUpdateComponent {
    const NAME: &'static str = "CameraUpdate";
}

/// Marker plus state of an active double-click zoom animation.
///
/// Its presence on the camera entity blocks further double-click zooms.
#[derive(Clone, Copy, Debug)]
pub struct CameraScaleEffectComponent {
    /// Zoom at animation start.
    pub start_zoom: f64,
    /// Zoom to land on.
    pub target_zoom: f64,
    /// Center at animation start.
    pub start_position: WorldPoint,
    /// Center to land on.
    pub target_position: WorldPoint,
    /// Time into the animation.
    pub elapsed_ms: f64,
    /// Total animation length.
    pub duration_ms: f64,
}

impl Component for CameraScaleEffectComponent {
    const NAME: &'static str = "CameraScaleEffect";
}

/// Sharp exponential ease-out.
fn ease_out_exp(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t >= 1.0 {
        1.0
    } else {
        1.0 - 2.0_f64.powf(-10.0 * t)
    }
}

fn camera_singleton(
    world: &EcsManager,
    ctx: &mut EngineContext,
) -> Option<EntityId> {
    let resolved: EngineResult<EntityId> = world.get_singleton::<CameraComponent>();
    match resolved {
        Ok(id) => Some(id),
        Err(error) => {
            ctx.errors.report(error);
            None
        }
    }
}

/// Turns drags into pan requests and double-clicks into zoom
/// animations.
pub struct CameraInputSystem;

impl EcsSystem<EngineContext> for CameraInputSystem {
    fn name(&self) -> &'static str {
        "camera_input"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(camera_id) = camera_singleton(world, ctx) else {
            return;
        };

        let (drag_delta, double_clicks) = match world.get_component::<MouseInputComponent>(camera_id)
        {
            Some(input) => (
                input.drag_delta,
                input
                    .events
                    .iter()
                    .filter(|e| e.kind == MouseEventKind::DoubleClicked)
                    .map(|e| e.location)
                    .collect::<Vec<ScreenPoint>>(),
            ),
            None => return,
        };

        let Some(camera) = world.get_component::<CameraComponent>(camera_id).copied() else {
            return;
        };

        // Dragging moves the world under the pointer: pan opposite the
        // drag, scaled to world units.
        if drag_delta != ScreenPoint::default() {
            let scale = ctx.viewport.scale();
            let target = camera.position
                - WorldPoint::new(drag_delta.x / scale, drag_delta.y / scale);
            if let Some(update) = world.get_component_mut::<CameraUpdateComponent>(camera_id) {
                update.requested_position = Some(target);
            }
        }

        for location in double_clicks {
            // No new animation while one runs or at maximum zoom.
            if world.has_component::<CameraScaleEffectComponent>(camera_id)
                || camera.zoom >= MAX_ZOOM
            {
                continue;
            }

            let focus = location.midpoint(ctx.viewport.screen_center());
            let target_position = ctx.viewport.get_map_coord(focus);
            let target_zoom = (camera.zoom.floor() + 1.0).min(MAX_ZOOM);

            world.add_component(
                camera_id,
                CameraScaleEffectComponent {
                    start_zoom: camera.zoom,
                    target_zoom,
                    start_position: camera.position,
                    target_position,
                    elapsed_ms: 0.0,
                    duration_ms: SCALE_EFFECT_DURATION_MS,
                },
            );
        }
    }
}

/// Eases current camera state toward the requested state.
///
/// Zoom is clamped on every write; once within epsilon of the target the
/// value snaps exactly and the request clears, so a settled camera holds
/// the precise requested value.
pub struct CameraUpdateSystem;

impl EcsSystem<EngineContext> for CameraUpdateSystem {
    fn name(&self) -> &'static str {
        "camera_update"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, dt_ms: f64) {
        let Some(camera_id) = camera_singleton(world, ctx) else {
            return;
        };

        let Some(request) = world.get_component::<CameraUpdateComponent>(camera_id).copied()
        else {
            return;
        };
        let Some(camera) = world.get_component::<CameraComponent>(camera_id).copied() else {
            return;
        };

        let factor = 1.0 - (-dt_ms / SMOOTHING_MS).exp();
        let mut new_camera = camera;
        let mut remaining = request;

        if let Some(target) = request.requested_zoom {
            let target = target.clamp(MIN_ZOOM, MAX_ZOOM);
            if (target - camera.zoom).abs() < ZOOM_SNAP {
                new_camera.zoom = target;
                remaining.requested_zoom = None;
            } else {
                new_camera.zoom =
                    (camera.zoom + (target - camera.zoom) * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }

        if let Some(target) = request.requested_position {
            // Snap within half a pixel at the current zoom.
            let snap = 0.5 / ctx.viewport.scale();
            let delta = target - camera.position;
            if delta.x.abs() < snap && delta.y.abs() < snap {
                new_camera.position = target;
                remaining.requested_position = None;
            } else {
                new_camera.position = camera.position + delta * factor;
            }
        }

        if let Some(state) = world.get_component_mut::<CameraComponent>(camera_id) {
            *state = new_camera;
        }
        if let Some(update) = world.get_component_mut::<CameraUpdateComponent>(camera_id) {
            *update = remaining;
        }
    }
}

/// Drives the double-click zoom animation to completion.
pub struct CameraScaleEffectSystem;

impl EcsSystem<EngineContext> for CameraScaleEffectSystem {
    fn name(&self) -> &'static str {
        "camera_scale_effect"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, dt_ms: f64) {
        let Some(camera_id) = camera_singleton(world, ctx) else {
            return;
        };

        let effect = {
            let Some(effect) = world.get_component_mut::<CameraScaleEffectComponent>(camera_id)
            else {
                return;
            };
            effect.elapsed_ms += dt_ms;
            *effect
        };

        let t = (effect.elapsed_ms / effect.duration_ms).min(1.0);
        let eased = ease_out_exp(t);

        let (zoom, position, finished) = if t >= 1.0 {
            (effect.target_zoom, effect.target_position, true)
        } else {
            (
                effect.start_zoom + (effect.target_zoom - effect.start_zoom) * eased,
                effect.start_position
                    + (effect.target_position - effect.start_position) * eased,
                false,
            )
        };

        if let Some(camera) = world.get_component_mut::<CameraComponent>(camera_id) {
            camera.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
            camera.position = position;
        }

        if finished {
            world.remove_component::<CameraScaleEffectComponent>(camera_id);
        }
    }
}

/// Mirrors settled camera state into the viewport.
///
/// Runs after every camera mutation and before any system that reads
/// world/screen transforms, so the viewport is never a tick stale.
pub struct ViewportUpdateSystem;

impl EcsSystem<EngineContext> for ViewportUpdateSystem {
    fn name(&self) -> &'static str {
        "viewport_update"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let Some(camera_id) = camera_singleton(world, ctx) else {
            return;
        };
        if let Some(camera) = world.get_component::<CameraComponent>(camera_id) {
            ctx.viewport.set_zoom(camera.zoom);
            ctx.viewport.set_center(camera.position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::test_context;
    use crate::input::MouseEvent;

    fn spawn_camera(world: &mut EcsManager, zoom: f64) -> EntityId {
        world
            .spawn("camera")
            .with(CameraComponent {
                zoom,
                position: WorldPoint::new(128.0, 128.0),
            })
            .with(CameraUpdateComponent::default())
            .with(MouseInputComponent::default())
            .id()
    }

    fn settle(world: &mut EcsManager, ctx: &mut EngineContext, ticks: usize) {
        for _ in 0..ticks {
            CameraUpdateSystem.update(world, ctx, 16.0);
            CameraScaleEffectSystem.update(world, ctx, 16.0);
            ViewportUpdateSystem.update(world, ctx, 16.0);
        }
    }

    #[test]
    fn test_zoom_request_settles_exactly() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 2.0);

        world
            .get_component_mut::<CameraUpdateComponent>(camera_id)
            .unwrap()
            .requested_zoom = Some(10.0);
        settle(&mut world, &mut ctx, 600);

        let camera = world.get_component::<CameraComponent>(camera_id).unwrap();
        assert_eq!(camera.zoom, 10.0);
        // Request cleared after settling.
        let update = world.get_component::<CameraUpdateComponent>(camera_id).unwrap();
        assert!(update.requested_zoom.is_none());
    }

    #[test]
    fn test_zoom_always_clamped() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 5.0);

        for request in [1000.0, -1000.0, MAX_ZOOM + 0.5, MIN_ZOOM - 0.5] {
            world
                .get_component_mut::<CameraUpdateComponent>(camera_id)
                .unwrap()
                .requested_zoom = Some(request);
            settle(&mut world, &mut ctx, 600);

            let zoom = world.get_component::<CameraComponent>(camera_id).unwrap().zoom;
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&zoom), "zoom {zoom} escaped");
        }
    }

    #[test]
    fn test_double_click_starts_animation() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 4.0);

        world
            .get_component_mut::<MouseInputComponent>(camera_id)
            .unwrap()
            .events
            .push(MouseEvent::new(
                MouseEventKind::DoubleClicked,
                ScreenPoint::new(100.0, 100.0),
            ));
        CameraInputSystem.update(&mut world, &mut ctx, 16.0);

        assert!(world.has_component::<CameraScaleEffectComponent>(camera_id));
        let effect = world
            .get_component::<CameraScaleEffectComponent>(camera_id)
            .unwrap();
        assert_eq!(effect.target_zoom, 5.0);

        // Runs to completion and lands exactly on the target.
        settle(&mut world, &mut ctx, 100);
        assert!(!world.has_component::<CameraScaleEffectComponent>(camera_id));
        let camera = world.get_component::<CameraComponent>(camera_id).unwrap();
        assert_eq!(camera.zoom, 5.0);
    }

    #[test]
    fn test_double_click_at_max_zoom_is_ignored() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, MAX_ZOOM);
        let before = *world.get_component::<CameraComponent>(camera_id).unwrap();

        world
            .get_component_mut::<MouseInputComponent>(camera_id)
            .unwrap()
            .events
            .push(MouseEvent::new(
                MouseEventKind::DoubleClicked,
                ScreenPoint::new(100.0, 100.0),
            ));
        CameraInputSystem.update(&mut world, &mut ctx, 16.0);
        settle(&mut world, &mut ctx, 10);

        assert!(!world.has_component::<CameraScaleEffectComponent>(camera_id));
        let after = world.get_component::<CameraComponent>(camera_id).unwrap();
        assert_eq!(after.zoom, before.zoom);
        assert_eq!(after.position, before.position);
    }

    #[test]
    fn test_double_click_during_animation_is_ignored() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 4.0);

        let click = MouseEvent::new(MouseEventKind::DoubleClicked, ScreenPoint::new(10.0, 10.0));
        world
            .get_component_mut::<MouseInputComponent>(camera_id)
            .unwrap()
            .events
            .push(click);
        CameraInputSystem.update(&mut world, &mut ctx, 16.0);
        let first = *world
            .get_component::<CameraScaleEffectComponent>(camera_id)
            .unwrap();

        // A second double-click mid-animation changes nothing.
        world
            .get_component_mut::<MouseInputComponent>(camera_id)
            .unwrap()
            .events
            .push(click);
        CameraInputSystem.update(&mut world, &mut ctx, 16.0);
        let second = *world
            .get_component::<CameraScaleEffectComponent>(camera_id)
            .unwrap();
        assert_eq!(first.target_zoom, second.target_zoom);
        assert_eq!(first.start_zoom, second.start_zoom);
    }

    #[test]
    fn test_drag_pans_against_drag_direction() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 3.0);
        ctx.viewport.set_zoom(3.0);

        world
            .get_component_mut::<MouseInputComponent>(camera_id)
            .unwrap()
            .drag_delta = ScreenPoint::new(80.0, 0.0);
        CameraInputSystem.update(&mut world, &mut ctx, 16.0);

        let request = world
            .get_component::<CameraUpdateComponent>(camera_id)
            .unwrap()
            .requested_position
            .unwrap();
        // Dragging east moves the view center west.
        assert!(request.x < 128.0);
        assert_eq!(request.y, 128.0);
    }

    #[test]
    fn test_viewport_mirrors_camera() {
        let mut world = EcsManager::new();
        let mut ctx = test_context();
        let camera_id = spawn_camera(&mut world, 6.0);
        world
            .get_component_mut::<CameraComponent>(camera_id)
            .unwrap()
            .position = WorldPoint::new(10.0, 20.0);

        ViewportUpdateSystem.update(&mut world, &mut ctx, 16.0);
        assert_eq!(ctx.viewport.zoom(), 6.0);
        assert_eq!(ctx.viewport.center(), WorldPoint::new(10.0, 20.0));
    }
}
