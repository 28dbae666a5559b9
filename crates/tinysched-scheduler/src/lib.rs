//! Tinysched Scheduler - placing pending pods onto nodes
//!
//! This crate provides:
//! - The scheduling queue of pending pods claimed by this scheduler
//! - The assume cache of bound-but-not-yet-observed placements
//! - Filter and score plugin pipelines
//! - The periodic scheduling engine and its cluster abstraction

pub mod cache;
pub mod cluster;
pub mod error;
pub mod filter;
pub mod queue;
pub mod scheduler;
pub mod score;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cache::{AssumeCache, AssumeCacheConfig};
pub use cluster::ClusterClient;
pub use error::{Result, SchedulerError};
pub use filter::{default_filters, FilterPlugin, ResourceFilter};
pub use queue::SchedulingQueue;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use score::{default_scores, EqualScore, LeastAllocated, ScorePlugin, EQUAL_SCORE};
pub use types::{CycleReport, NodeScore, ScheduleOutcome, ScheduleResult, SkipReason};
