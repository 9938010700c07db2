//! # Input Systems
//!
//! The host pushes mouse events into the engine's queue; the input
//! system runs first every tick and delivers them to listening entities.
//! Interpretation (panning, double-click zoom) happens downstream in the
//! camera systems.

use std::collections::VecDeque;

use meridian_core::{Component, EcsManager, EcsSystem};
use meridian_geo::{ScreenPoint, ScreenRect};

use crate::context::EngineContext;

/// The full mouse event set delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    /// Pointer entered the viewport.
    Entered,
    /// Pointer left the viewport.
    Left,
    /// Pointer moved with no button held.
    Moved,
    /// Pointer moved with a button held.
    Dragged,
    /// Single click.
    Clicked,
    /// Double click.
    DoubleClicked,
    /// Button pressed.
    Pressed,
    /// Button released.
    Released,
}

/// One mouse event at a viewport location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouseEvent {
    /// What happened.
    pub kind: MouseEventKind,
    /// Where, in viewport pixels.
    pub location: ScreenPoint,
}

impl MouseEvent {
    /// Creates a mouse event.
    #[must_use]
    pub const fn new(kind: MouseEventKind, location: ScreenPoint) -> Self {
        Self { kind, location }
    }
}

/// Per-entity mouse input mailbox, refilled every tick.
#[derive(Debug, Default)]
pub struct MouseInputComponent {
    /// Events delivered this tick, in arrival order.
    pub events: Vec<MouseEvent>,
    /// Total drag movement this tick, in pixels.
    pub drag_delta: ScreenPoint,
    /// Pointer position of the ongoing press/drag, if any.
    pub press_position: Option<ScreenPoint>,
}

impl Component for MouseInputComponent {
    const NAME: &'static str = "MouseInput";
}

/// Screen-space hit area gating click delivery to an entity.
#[derive(Clone, Copy, Debug)]
pub struct ClickableComponent {
    /// Events with a location outside this area are not delivered.
    pub area: ScreenRect,
}

impl Component for ClickableComponent {
    const NAME: &'static str = "Clickable";
}

/// Delivers queued host events to every entity carrying a
/// [`MouseInputComponent`]. Runs before all other systems.
pub struct MouseInputSystem;

impl EcsSystem<EngineContext> for MouseInputSystem {
    fn name(&self) -> &'static str {
        "mouse_input"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        let events: Vec<MouseEvent> = ctx.mouse_events.drain(..).collect();

        let listeners = world.entities_with::<MouseInputComponent>();
        for id in listeners {
            let area = world.get_component::<ClickableComponent>(id).map(|c| c.area);
            let Some(input) = world.get_component_mut::<MouseInputComponent>(id) else {
                continue;
            };

            input.events.clear();
            input.drag_delta = ScreenPoint::default();

            for event in &events {
                if let Some(area) = area {
                    let positional = matches!(
                        event.kind,
                        MouseEventKind::Clicked
                            | MouseEventKind::DoubleClicked
                            | MouseEventKind::Pressed
                    );
                    if positional && !area.contains(event.location) {
                        continue;
                    }
                }

                match event.kind {
                    MouseEventKind::Pressed => input.press_position = Some(event.location),
                    MouseEventKind::Dragged => {
                        if let Some(last) = input.press_position {
                            input.drag_delta = input.drag_delta + (event.location - last);
                        }
                        input.press_position = Some(event.location);
                    }
                    MouseEventKind::Released | MouseEventKind::Left => {
                        input.press_position = None;
                    }
                    _ => {}
                }

                input.events.push(*event);
            }
        }
    }
}

/// Queue type the host pushes events into; drained once per tick.
pub type MouseEventQueue = VecDeque<MouseEvent>;
