mod config;
pub mod builder;
pub mod executor;
pub mod fields;
pub mod manual;
pub mod normalize;
pub mod pipeline;
pub mod present;
pub mod ranking;
pub mod scheduler;
pub mod score;

pub use crate::config::*;

pub use crate::executor::{Executor, InlineExecutor, WorkerExecutor};
pub use crate::fields::classify;
pub use crate::normalize::{apply_derived_fields, compute_stats, normalize_all};
pub use crate::pipeline::{run_pipeline, Derived, PipelineError, PipelineRequest};
pub use crate::present::Boundaries;
pub use crate::ranking::rank;
pub use crate::scheduler::{Scheduler, Ticket};
pub use crate::score::{score_all, score_one};
