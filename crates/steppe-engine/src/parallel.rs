//! Fan-out of one work item into per-branch items
//!
//! A parallel step's direct children are its branches. When an item enters
//! the step it is parked at the parallel step itself as `ParallelLocked` and
//! one branch item per child is produced, each placed at that branch's leaf.
//! Branch ids are `{parent id}-{branch segment}`, so a branch always maps to
//! the same id.

use steppe_core::{
    Result, SteppeError, WorkItem, WorkItemParent, WorkItemStatus, WorkStep, ROOT_PATH,
};

use crate::step_query::WorkStepQuery;

/// Outcome of a split, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelSplit {
    /// The original item, moved to the parallel step and locked
    pub parent: WorkItem,
    /// One item per branch, in branch order
    pub branches: Vec<WorkItem>,
}

impl ParallelSplit {
    pub fn branch(&self, id: &str) -> Option<&WorkItem> {
        self.branches.iter().find(|b| b.id == id)
    }
}

#[derive(Clone)]
pub struct ParallelStepHelper {
    step_query: WorkStepQuery,
}

impl ParallelStepHelper {
    pub fn new(step_query: WorkStepQuery) -> Self {
        Self { step_query }
    }

    /// Id of the branch item of `parent_id` responsible for `step_path`
    ///
    /// `step_path` may be the branch step or anything below it. Returns `None`
    /// if `step_path` is not strictly below `parallel_root`.
    pub fn parallel_id(parent_id: &str, parallel_root: &str, step_path: &str) -> Option<String> {
        let rest = if parallel_root == ROOT_PATH {
            step_path.strip_prefix('/')?
        } else {
            step_path.strip_prefix(parallel_root)?.strip_prefix('/')?
        };
        let segment = rest.split('/').next().filter(|s| !s.is_empty())?;
        Some(format!("{}-{}", parent_id, segment))
    }

    /// Plan the split of `item` over the branches of `parallel_root`
    pub async fn split_for_parallelism(
        &self,
        item: &WorkItem,
        parallel_root: &WorkStep,
    ) -> Result<ParallelSplit> {
        let parent = item
            .clone()
            .move_to(parallel_root)
            .with_status(WorkItemStatus::ParallelLocked)?;

        let mut branches = Vec::new();
        for branch in self.step_query.get_child_work_steps(&parallel_root.path).await? {
            let id = Self::parallel_id(&item.id, &parallel_root.path, &branch.path).ok_or_else(|| {
                SteppeError::ConsistencyFault(format!(
                    "step {} is not a branch of {}",
                    branch.path, parallel_root.path
                ))
            })?;
            let leaf = self.step_query.get_leaf_step(&branch.path).await?;

            let mut classes = item.classes.clone();
            classes.extend(self.step_query.get_work_item_classes(&leaf));

            let mut split = WorkItem::new(id, leaf.path.clone(), classes)
                .with_parent(WorkItemParent::parallelled(item.id.clone()));
            split.properties = item.properties.clone();
            branches.push(split);
        }

        if branches.is_empty() {
            return Err(SteppeError::InvalidTransition(format!(
                "parallel step {} has no branches",
                parallel_root.path
            )));
        }

        Ok(ParallelSplit { parent, branches })
    }
}
