//! Read-only lookups and predicates over work items

use std::sync::Arc;
use steppe_core::{ParentKind, Result, SteppeError, WorkItem, WorkItemStatus, WorkStepType};
use steppe_storage::{WorkItemRepository, WorkStepRepository};

/// Queries over work items and where they sit
#[derive(Clone)]
pub struct WorkItemQuery {
    steps: Arc<dyn WorkStepRepository>,
    items: Arc<dyn WorkItemRepository>,
}

impl WorkItemQuery {
    pub fn new(steps: Arc<dyn WorkStepRepository>, items: Arc<dyn WorkItemRepository>) -> Self {
        Self { steps, items }
    }

    /// Look an item up without treating absence as an error
    pub async fn try_locate_work_item(&self, id: &str) -> Result<Option<WorkItem>> {
        match self.items.get_work_item(id).await {
            Ok(item) => Ok(Some(item)),
            Err(SteppeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ordinal for `item` at its (new) path: one past the highest ordinal of
    /// the other items there, or 0 if it is alone
    pub async fn next_ordinal(&self, item: &WorkItem) -> Result<u32> {
        let highest = self
            .items
            .get_work_items(&item.path)
            .await?
            .iter()
            .filter(|wi| wi.id != item.id)
            .map(|wi| wi.ordinal)
            .max();
        Ok(highest.map_or(0, |max| max + 1))
    }

    pub fn is_parallel_locked_work_item(&self, item: &WorkItem) -> bool {
        item.status == WorkItemStatus::ParallelLocked
    }

    pub fn is_expand_locked(&self, item: &WorkItem) -> bool {
        item.status == WorkItemStatus::ExpandLocked
    }

    /// True for branch items produced by a parallel split
    pub fn is_child_of_parallelled_work_item(&self, item: &WorkItem) -> bool {
        matches!(&item.parent, Some(p) if p.kind == ParentKind::Parallelled)
    }

    /// True for items created inside another item's transient subtree
    pub fn is_child_of_expanded_work_item(&self, item: &WorkItem) -> bool {
        matches!(&item.parent, Some(p) if p.kind == ParentKind::Expanded)
    }

    /// True if the item sits on an existing end step
    pub async fn is_done(&self, item: &WorkItem) -> Result<bool> {
        if !self.steps.exists_work_step(&item.path).await? {
            return Ok(false);
        }
        let step = self.steps.get_work_step(&item.path).await?;
        Ok(step.step_type == WorkStepType::End)
    }

    /// True if the step the item sits on still exists
    ///
    /// Children of an expansion keep their paths after the owner leaves and
    /// its subtree is removed.
    pub async fn occupies_existing_step(&self, item: &WorkItem) -> Result<bool> {
        self.steps.exists_work_step(&item.path).await
    }

    pub async fn get_child_work_items(&self, parent_id: &str) -> Result<Vec<WorkItem>> {
        self.items.get_child_work_items(parent_id).await
    }

    /// Branch items of a split of `parent_id`, without its expansion children
    pub async fn get_parallel_branches(&self, parent_id: &str) -> Result<Vec<WorkItem>> {
        Ok(self
            .get_child_work_items(parent_id)
            .await?
            .into_iter()
            .filter(|wi| self.is_child_of_parallelled_work_item(wi))
            .collect())
    }

    /// Items created inside the transient subtree of `parent_id`
    pub async fn get_expansion_children(&self, parent_id: &str) -> Result<Vec<WorkItem>> {
        Ok(self
            .get_child_work_items(parent_id)
            .await?
            .into_iter()
            .filter(|wi| self.is_child_of_expanded_work_item(wi))
            .collect())
    }

    pub async fn get_work_items(&self, path: &str) -> Result<Vec<WorkItem>> {
        self.items.get_work_items(path).await
    }
}
