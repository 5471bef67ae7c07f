//! # steppe-core
//!
//! Core types for the steppe work-item process engine.
//!
//! Work items travel through a hierarchical process graph of work steps.
//! This crate holds the pieces every other crate shares:
//!
//! - `WorkStep` / `WorkItem` and their status and class helpers
//! - the unified `SteppeError`
//! - configuration and declarative process graphs
//! - bounded retry with backoff for backing-store calls

pub mod config;
mod error;
pub mod process;
pub mod retry;
mod types;

pub use config::{ReplicationConfig, SteppeConfig};
pub use error::{Result, SteppeError};
pub use process::{ProcessDefinition, StepDefinition};
pub use retry::{retry_with_backoff, RetryExhausted, RetryPolicy};
pub use types::*;
