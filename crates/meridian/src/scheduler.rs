//! # Scheduler System
//!
//! The last system of the tick: drains one slice of the microtask
//! executor and merges completions into component storage. This is the
//! only place background results touch the ECS, so storage keeps a
//! single writer; completions whose owner entity died are discarded
//! here.

use meridian_core::{Component, EcsManager, EcsSystem, MicroTaskExecutor, TaskId, TaskOutcome};
use meridian_geo::WorldPoint;

use crate::cells::CellLayerKind;
use crate::context::EngineContext;
use crate::render::{RenderContent, RenderableComponent};

/// Results microtasks can produce.
#[derive(Debug)]
pub enum Computation {
    /// Fragment geometry projected into world coordinates.
    FragmentGeometry {
        /// Projected polylines.
        polylines: Vec<Vec<WorldPoint>>,
    },
}

/// Marks an entity as owning an in-flight microtask.
#[derive(Clone, Copy, Debug)]
pub struct MicrotaskPendingComponent {
    /// The submitted task.
    pub task: TaskId,
}

impl Component for MicrotaskPendingComponent {
    const NAME: &'static str = "MicrotaskPending";
}

/// Drains the executor and applies completed computations.
pub struct SchedulerSystem;

impl EcsSystem<EngineContext> for SchedulerSystem {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn update(&mut self, world: &mut EcsManager, ctx: &mut EngineContext, _dt_ms: f64) {
        for completion in ctx.executor.run_slice() {
            if !world.is_alive(completion.owner) {
                // The originating entity was destroyed; the result is
                // discarded on arrival.
                continue;
            }

            match completion.outcome {
                TaskOutcome::Finished(Computation::FragmentGeometry { polylines }) => {
                    world.remove_component::<MicrotaskPendingComponent>(completion.owner);
                    world.add_component(
                        completion.owner,
                        RenderableComponent {
                            layer_kind: CellLayerKind::World,
                            content: RenderContent::WorldPath { polylines },
                        },
                    );
                }
                TaskOutcome::Failed => {
                    world.remove_component::<MicrotaskPendingComponent>(completion.owner);
                    tracing::warn!(owner = %completion.owner, "microtask failed; entity left unrendered");
                }
                TaskOutcome::Cancelled => {}
            }
        }

        ctx.metrics.microtasks_pending = ctx.executor.pending_count();
    }
}
