//! # MERIDIAN Core Runtime
//!
//! Entity-component runtime driving the interactive map engine:
//! - Typed per-component tables owned by a single manager
//! - Generational entity ids - stale references are detected, never followed
//! - A scheduler running a fixed, explicitly ordered system list per tick
//! - Microtask executors for computations too large for one frame
//!
//! ## Architecture Rules
//!
//! 1. **Single writer** - only the frame thread mutates component storage
//! 2. **No references across ticks** - systems re-query by entity id each tick
//! 3. **Errors are data** - systems report through a channel and keep going
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_core::{EcsManager, EcsController};
//!
//! let mut world = EcsManager::new();
//! let camera = world.spawn("camera").id();
//! ```

pub mod ecs;
pub mod error;
pub mod multitask;
pub mod schedule;

pub use ecs::{Component, ComponentTable, EcsManager, EntityBuilder, EntityId};
pub use error::{EngineError, EngineResult, ErrorReporter, ErrorSink};
pub use multitask::{
    BackgroundExecutor, CooperativeExecutor, MicroTask, MicroTaskExecutor, TaskCompletion, TaskId,
    TaskOutcome, TaskStep,
};
pub use schedule::{EcsController, EcsSystem, TickReport};
