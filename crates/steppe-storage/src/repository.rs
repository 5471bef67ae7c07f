//! Repository contracts consumed by the workflow engine
//!
//! Every successful write must be visible to subsequent reads issued against
//! the same repository instance, even when an implementation replicates to
//! durable storage asynchronously.

use async_trait::async_trait;
use steppe_core::{Result, WorkItem, WorkStep};

/// Storage for the step table, static and materialized steps alike
#[async_trait]
pub trait WorkStepRepository: Send + Sync {
    /// Store a new step
    ///
    /// Fails with `AlreadyExists` if the path is taken, or `NotFound` if the
    /// parent path does not exist.
    async fn create_work_step(&self, step: &WorkStep) -> Result<()>;

    /// Replace an existing step; fails with `NotFound` if absent
    async fn update_work_step(&self, step: &WorkStep) -> Result<()>;

    /// Remove a step; fails while the step still has children
    async fn delete_work_step(&self, path: &str) -> Result<()>;

    /// Fetch a step; fails with `NotFound` if absent
    async fn get_work_step(&self, path: &str) -> Result<WorkStep>;

    /// Direct children of `path`, ordered by ordinal
    async fn get_child_work_steps(&self, path: &str) -> Result<Vec<WorkStep>>;

    async fn exists_work_step(&self, path: &str) -> Result<bool>;
}

/// Storage for work items
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Store a new item; fails with `AlreadyExists` if the id is taken
    async fn create_work_item(&self, item: &WorkItem) -> Result<()>;

    /// Replace an existing item; fails with `NotFound` if absent
    async fn update_work_item(&self, item: &WorkItem) -> Result<()>;

    /// Remove an item; fails with `NotFound` if absent
    async fn delete_work_item(&self, item: &WorkItem) -> Result<()>;

    /// Fetch an item; fails with `NotFound` if absent
    async fn get_work_item(&self, id: &str) -> Result<WorkItem>;

    /// Items currently at `path`, ordered by ordinal
    async fn get_work_items(&self, path: &str) -> Result<Vec<WorkItem>>;

    /// Items whose parent is `parent_id`, ordered by id
    async fn get_child_work_items(&self, parent_id: &str) -> Result<Vec<WorkItem>>;

    async fn exists_work_item(&self, id: &str) -> Result<bool>;
}

/// A step store that can hand over its whole table, so a cache can warm up
#[async_trait]
pub trait WorkStepSnapshot: WorkStepRepository {
    async fn all_work_steps(&self) -> Result<Vec<WorkStep>>;
}

/// An item store that can hand over all items, so a cache can warm up
#[async_trait]
pub trait WorkItemSnapshot: WorkItemRepository {
    async fn all_work_items(&self) -> Result<Vec<WorkItem>>;
}

/// Order items by ordinal, then id, for stable listings
pub(crate) fn sort_by_arrival(items: &mut [WorkItem]) {
    items.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
}

/// Order steps by ordinal, then path
pub(crate) fn sort_by_ordinal(steps: &mut [WorkStep]) {
    steps.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.path.cmp(&b.path)));
}
