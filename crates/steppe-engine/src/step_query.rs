//! Read-only navigation of the step tree
//!
//! All queries see the full step table, static steps and materialized
//! transient steps alike. Ancestor and subtree walks are iterative.

use std::collections::BTreeSet;
use std::sync::Arc;
use steppe_core::{normalize_path, Result, WorkItem, WorkItemClass, WorkStep, WorkStepType};
use steppe_storage::WorkStepRepository;

/// Queries over the process graph
#[derive(Clone)]
pub struct WorkStepQuery {
    steps: Arc<dyn WorkStepRepository>,
}

impl WorkStepQuery {
    pub fn new(steps: Arc<dyn WorkStepRepository>) -> Self {
        Self { steps }
    }

    /// Resolve `path` to the step an item addressed there lands on
    ///
    /// Normal, parallel and transient steps with children are containers:
    /// resolution descends through their first child. Begin, end and expand
    /// steps are landing points even when they have children.
    pub async fn get_leaf_step(&self, path: &str) -> Result<WorkStep> {
        let mut step = self.steps.get_work_step(&normalize_path(path)).await?;
        loop {
            if !is_container(step.step_type) {
                return Ok(step);
            }
            match self.get_child_work_steps(&step.path).await?.into_iter().next() {
                Some(first) => step = first,
                None => return Ok(step),
            }
        }
    }

    /// Nearest transient root at or above `step`
    pub async fn is_within_transient_step(&self, step: &WorkStep) -> Result<Option<WorkStep>> {
        self.find_ancestor_or_self(step, |s| s.step_type == WorkStepType::Transient)
            .await
    }

    /// True if a proper ancestor of `step` is an expand step
    pub async fn is_within_expand_step(&self, step: &WorkStep) -> Result<bool> {
        Ok(self
            .find_proper_ancestor(step, |s| s.step_type == WorkStepType::Expand)
            .await?
            .is_some())
    }

    pub fn is_expand_step(&self, step: &WorkStep) -> bool {
        step.step_type == WorkStepType::Expand
    }

    /// Nearest parallel step strictly above `step`
    pub async fn is_within_parallel_step(&self, step: &WorkStep) -> Result<Option<WorkStep>> {
        self.find_proper_ancestor(step, |s| s.step_type == WorkStepType::Parallel)
            .await
    }

    /// True if the step's class is one of the item's classes
    pub fn is_valid_work_step_for_work_item(&self, item: &WorkItem, step: &WorkStep) -> bool {
        item.classes.contains(&step.work_item_class)
    }

    /// Transient root around the item's current step, if the step still exists
    pub async fn is_in_transient_step(&self, item: &WorkItem) -> Result<Option<WorkStep>> {
        if !self.steps.exists_work_step(&item.path).await? {
            return Ok(None);
        }
        let step = self.steps.get_work_step(&item.path).await?;
        self.is_within_transient_step(&step).await
    }

    /// Classes an item picks up at `step`: its class and that class's roots
    pub fn get_work_item_classes(&self, step: &WorkStep) -> BTreeSet<String> {
        let mut classes: BTreeSet<String> = WorkItemClass::root_classes(&step.work_item_class)
            .into_iter()
            .collect();
        if !step.work_item_class.is_empty() {
            classes.insert(step.work_item_class.clone());
        }
        classes
    }

    pub async fn get_child_work_steps(&self, path: &str) -> Result<Vec<WorkStep>> {
        self.steps.get_child_work_steps(path).await
    }

    pub async fn get_work_step(&self, path: &str) -> Result<WorkStep> {
        self.steps.get_work_step(&normalize_path(path)).await
    }

    /// Every step below `root`, parents before children
    pub async fn get_descendants(&self, root: &WorkStep) -> Result<Vec<WorkStep>> {
        let mut found = Vec::new();
        let mut stack = vec![root.path.clone()];
        while let Some(path) = stack.pop() {
            for child in self.get_child_work_steps(&path).await? {
                stack.push(child.path.clone());
                found.push(child);
            }
        }
        Ok(found)
    }

    async fn find_ancestor_or_self<F>(&self, step: &WorkStep, pred: F) -> Result<Option<WorkStep>>
    where
        F: Fn(&WorkStep) -> bool,
    {
        if pred(step) {
            return Ok(Some(step.clone()));
        }
        self.find_proper_ancestor(step, pred).await
    }

    async fn find_proper_ancestor<F>(&self, step: &WorkStep, pred: F) -> Result<Option<WorkStep>>
    where
        F: Fn(&WorkStep) -> bool,
    {
        let mut parent_path = step.parent_path.clone();
        while let Some(path) = parent_path {
            let parent = self.steps.get_work_step(&path).await?;
            if pred(&parent) {
                return Ok(Some(parent));
            }
            parent_path = parent.parent_path;
        }
        Ok(None)
    }
}

/// Steps that hand an arriving item on to their first child
pub(crate) fn is_container(step_type: WorkStepType) -> bool {
    matches!(
        step_type,
        WorkStepType::Normal | WorkStepType::Parallel | WorkStepType::Transient
    )
}
