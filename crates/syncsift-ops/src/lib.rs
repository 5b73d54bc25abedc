//! Action planning and plan execution for syncsift.
//!
//! The [`ActionPlanner`] turns analysis findings into an ordered
//! [`ExecutionPlan`]; the [`Executor`] applies it. Plans start in simulate
//! mode. In real mode every removed file is first copied into a per-run
//! backup folder, and structural moves only run once their action id has
//! been confirmed.

mod executor;
mod fsops;
mod pipeline;
mod planner;
mod progress;

pub use executor::{ExecutionOptions, Executor};
pub use pipeline::{AnalysisPipeline, AnalysisRun};
pub use planner::{
    ARCHIVE_CONFIDENCE, ActionPlanner, RECENT_TEMP_CONFIDENCE, SETTLED_TEMP_CONFIDENCE, action_id,
};
pub use progress::ExecutionProgress;

pub use syncsift_core::{
    ActionId, ActionKind, ActionOutcome, ActionStatus, ExecutionMode, ExecutionPlan,
    ExecutionReport, OptimizationAction,
};

/// Default channel buffer size for execution progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
