//! steppe storage - repositories for work steps and work items
//!
//! This crate defines the repository contracts the workflow engine consumes
//! and ships the implementations it is usually wired with.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         steppe-engine (Workflow)            │
//! └──────────┬──────────────────────┬───────────┘
//!            │ WorkStepRepository   │ WorkItemRepository
//! ┌──────────▼───────────┐ ┌────────▼────────────────────┐
//! │ CachingWorkStepRepo  │ │ AsyncCachingWorkItemRepo    │
//! │ • write-through      │ │ • read-your-write cache     │
//! │ • store before cache │ │ • Replicator (retry, DLQ)   │
//! └──────────┬───────────┘ └────────┬────────────────────┘
//!            │                      │ (async, FIFO)
//! ┌──────────▼──────────────────────▼───────────┐
//! │   Backing stores (Memory* or external)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use steppe_core::{ReplicationConfig, WorkItem};
//! use steppe_storage::{AsyncCachingWorkItemRepository, MemoryWorkItemRepository, WorkItemRepository};
//!
//! # async fn example() -> steppe_core::Result<()> {
//! let store = Arc::new(MemoryWorkItemRepository::new());
//! let (items, mut dead_letters) =
//!     AsyncCachingWorkItemRepository::load(store, &ReplicationConfig::default()).await?;
//!
//! items.create_work_item(&WorkItem::new("A", "/todo", vec!["task".to_string()])).await?;
//! // Visible immediately, replicated in the background
//! assert!(items.exists_work_item("A").await?);
//!
//! tokio::spawn(async move {
//!     while let Some(letter) = dead_letters.recv().await {
//!         eprintln!("not replicated: {:?}", letter.mutation);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod async_cache;
pub mod cache;
pub mod memory;
pub mod replication;
pub mod repository;

pub use async_cache::AsyncCachingWorkItemRepository;
pub use cache::CachingWorkStepRepository;
pub use memory::{MemoryWorkItemRepository, MemoryWorkStepRepository};
pub use replication::{DeadLetter, ItemMutation, ReplicationStats, Replicator};
pub use repository::{WorkItemRepository, WorkItemSnapshot, WorkStepRepository, WorkStepSnapshot};
