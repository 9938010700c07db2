//! # System Scheduler
//!
//! Runs a fixed, explicitly ordered list of systems once per animation
//! tick. Ordering is a hard contract: input systems must precede camera
//! updates, request systems must precede loading/removal systems,
//! positional systems must precede rendering, and the microtask drain
//! runs last. The order is set once at registration and never changes.
//!
//! Systems do not abort the tick. A system that hits a failure reports it
//! through the context's error channel and returns; the remaining systems
//! still run, so the frame pipeline never wedges on one bad input.

use std::time::Instant;

use crate::ecs::EcsManager;

/// A frame over budget by this much gets a slow-frame warning.
const SLOW_TICK_WARN_MS: f64 = 33.0;

/// A unit of per-tick logic.
///
/// Systems are stateless between frames apart from private fields fixed at
/// construction; all shared state lives in components or in the context.
/// `Ctx` is the engine-supplied context type giving systems access to
/// shared services (viewport, error reporter, loaders).
pub trait EcsSystem<Ctx> {
    /// Stable name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Runs one step, given elapsed time since the previous tick.
    fn update(&mut self, world: &mut EcsManager, ctx: &mut Ctx, dt_ms: f64);
}

/// Timing record for one controller tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickReport {
    /// Sequence number of the tick.
    pub tick: u64,
    /// Systems executed.
    pub systems_run: usize,
    /// Wall time of the whole tick in milliseconds.
    pub total_ms: f64,
    /// Name of the slowest system this tick.
    pub slowest_system: &'static str,
    /// Wall time of the slowest system in milliseconds.
    pub slowest_ms: f64,
}

/// The ECS controller: owns the world and the ordered system list.
pub struct EcsController<Ctx> {
    world: EcsManager,
    systems: Vec<Box<dyn EcsSystem<Ctx>>>,
    tick_count: u64,
}

impl<Ctx> EcsController<Ctx> {
    /// Creates a controller over a world and a registration-ordered system
    /// list.
    #[must_use]
    pub fn new(world: EcsManager, systems: Vec<Box<dyn EcsSystem<Ctx>>>) -> Self {
        Self {
            world,
            systems,
            tick_count: 0,
        }
    }

    /// Runs every system once, in registration order.
    ///
    /// After each system step the manager purges entities marked for
    /// removal, so a later system in the same tick never observes an
    /// entity an earlier system removed. Component writes made by system N
    /// are visible to system N+1.
    pub fn update(&mut self, ctx: &mut Ctx, dt_ms: f64) -> TickReport {
        let tick_start = Instant::now();
        let mut slowest_system = "";
        let mut slowest_ms = 0.0_f64;

        for system in &mut self.systems {
            let start = Instant::now();
            system.update(&mut self.world, ctx, dt_ms);
            self.world.purge_removed();

            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            if elapsed_ms > slowest_ms {
                slowest_ms = elapsed_ms;
                slowest_system = system.name();
            }
        }

        let total_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        if total_ms > SLOW_TICK_WARN_MS {
            tracing::warn!(
                tick = self.tick_count,
                total_ms,
                slowest_system,
                slowest_ms,
                "tick exceeded frame budget"
            );
        }

        let report = TickReport {
            tick: self.tick_count,
            systems_run: self.systems.len(),
            total_ms,
            slowest_system,
            slowest_ms,
        };
        self.tick_count += 1;
        report
    }

    /// Read access to the world, for host setup and assertions.
    #[must_use]
    pub fn world(&self) -> &EcsManager {
        &self.world
    }

    /// Write access to the world, for host setup between ticks.
    pub fn world_mut(&mut self) -> &mut EcsManager {
        &mut self.world
    }

    /// Number of completed ticks.
    #[inline]
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Names of the registered systems, in execution order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Component;

    struct Tally(Vec<&'static str>);
    impl Component for Tally {
        const NAME: &'static str = "Tally";
    }

    struct Recorder(&'static str);

    impl EcsSystem<()> for Recorder {
        fn name(&self) -> &'static str {
            self.0
        }

        fn update(&mut self, world: &mut EcsManager, _ctx: &mut (), _dt_ms: f64) {
            for (_, tally) in world.get_components_mut::<Tally>() {
                tally.0.push(self.0);
            }
        }
    }

    struct Remover;

    impl EcsSystem<()> for Remover {
        fn name(&self) -> &'static str {
            "remover"
        }

        fn update(&mut self, world: &mut EcsManager, _ctx: &mut (), _dt_ms: f64) {
            for id in world.entities_with::<Tally>() {
                world.remove_entity(id);
            }
        }
    }

    #[test]
    fn test_systems_run_in_registration_order() {
        let mut world = EcsManager::new();
        let id = world.spawn("tally").with(Tally(Vec::new())).id();

        let systems: Vec<Box<dyn EcsSystem<()>>> = vec![
            Box::new(Recorder("input")),
            Box::new(Recorder("camera")),
            Box::new(Recorder("render")),
        ];
        let mut controller = EcsController::new(world, systems);

        let report = controller.update(&mut (), 16.0);
        assert_eq!(report.systems_run, 3);

        let tally = controller.world().get_component::<Tally>(id).unwrap();
        assert_eq!(tally.0, vec!["input", "camera", "render"]);
    }

    #[test]
    fn test_removal_settles_between_systems() {
        let mut world = EcsManager::new();
        world.spawn("tally").with(Tally(Vec::new())).id();

        let systems: Vec<Box<dyn EcsSystem<()>>> =
            vec![Box::new(Remover), Box::new(Recorder("late"))];
        let mut controller = EcsController::new(world, systems);

        controller.update(&mut (), 16.0);
        // The remover ran first; the recorder saw no tally entities.
        assert_eq!(controller.world().alive_count(), 0);
    }

    #[test]
    fn test_tick_count_advances() {
        let controller_world = EcsManager::new();
        let mut controller: EcsController<()> = EcsController::new(controller_world, Vec::new());
        assert_eq!(controller.tick_count(), 0);
        controller.update(&mut (), 16.0);
        controller.update(&mut (), 16.0);
        assert_eq!(controller.tick_count(), 2);
    }
}
