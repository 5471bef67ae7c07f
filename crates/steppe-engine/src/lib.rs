//! steppe engine - moves work items through a process graph
//!
//! The engine owns the rules: where items may be created, which moves are
//! legal, and what a move implies for other items and for the step tree.
//!
//! # Components
//!
//! - [`WorkStepQuery`]: leaf resolution and ancestry checks over the step tree
//! - [`WorkItemQuery`]: item lookup, ordinals, lock and completion predicates
//! - [`ParallelStepHelper`]: splits an item across the branches of a parallel step
//! - [`Workflow`]: the two commands and everything they set in motion
//! - [`KeyedLocks`]: exclusive sections that serialize conflicting commands
//!
//! # Example Usage
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use steppe_core::{ProcessDefinition, StepDefinition, WorkStepType};
//! use steppe_engine::Workflow;
//! use steppe_storage::{MemoryWorkItemRepository, MemoryWorkStepRepository};
//!
//! # async fn example() -> steppe_core::Result<()> {
//! let workflow = Workflow::new(
//!     Arc::new(MemoryWorkStepRepository::new()),
//!     Arc::new(MemoryWorkItemRepository::new()),
//! );
//! workflow
//!     .install_process(ProcessDefinition::new(vec![
//!         StepDefinition::new("/todo", WorkStepType::Begin, "cr"),
//!         StepDefinition::new("/doing", WorkStepType::Normal, "cr"),
//!         StepDefinition::new("/done", WorkStepType::End, "cr"),
//!     ]))
//!     .await?;
//!
//! workflow.create_work_item("A", "/todo").await?;
//! workflow.update_work_item("A", "/doing", &BTreeMap::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod item_query;
pub mod keyed_lock;
pub mod parallel;
pub mod step_query;
pub mod workflow;

pub use item_query::WorkItemQuery;
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use parallel::{ParallelSplit, ParallelStepHelper};
pub use step_query::WorkStepQuery;
pub use workflow::Workflow;
