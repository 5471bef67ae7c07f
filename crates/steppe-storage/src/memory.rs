//! In-memory repositories
//!
//! Reference implementations of the repository contracts. They back the
//! engine in tests and serve as the innermost store behind the caches.

use async_trait::async_trait;
use std::collections::HashMap;
use steppe_core::{Result, SteppeError, WorkItem, WorkStep};
use tokio::sync::RwLock;

use crate::repository::{
    sort_by_arrival, sort_by_ordinal, WorkItemRepository, WorkItemSnapshot, WorkStepRepository,
    WorkStepSnapshot,
};

/// Step table held in a map keyed by path
#[derive(Default)]
pub struct MemoryWorkStepRepository {
    steps: RwLock<HashMap<String, WorkStep>>,
}

impl MemoryWorkStepRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding `steps`, which must be ordered parents-first
    pub async fn with_steps(steps: impl IntoIterator<Item = WorkStep>) -> Result<Self> {
        let repo = Self::new();
        for step in steps {
            repo.create_work_step(&step).await?;
        }
        Ok(repo)
    }

    pub async fn len(&self) -> usize {
        self.steps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.steps.read().await.is_empty()
    }
}

#[async_trait]
impl WorkStepRepository for MemoryWorkStepRepository {
    async fn create_work_step(&self, step: &WorkStep) -> Result<()> {
        let mut steps = self.steps.write().await;
        if steps.contains_key(&step.path) {
            return Err(SteppeError::AlreadyExists(format!("work step {}", step.path)));
        }
        if let Some(parent) = &step.parent_path {
            if !steps.contains_key(parent) {
                return Err(SteppeError::NotFound(format!(
                    "parent step {} of {}",
                    parent, step.path
                )));
            }
        }
        steps.insert(step.path.clone(), step.clone());
        Ok(())
    }

    async fn update_work_step(&self, step: &WorkStep) -> Result<()> {
        let mut steps = self.steps.write().await;
        match steps.get_mut(&step.path) {
            Some(existing) => {
                *existing = step.clone();
                Ok(())
            }
            None => Err(SteppeError::NotFound(format!("work step {}", step.path))),
        }
    }

    async fn delete_work_step(&self, path: &str) -> Result<()> {
        let mut steps = self.steps.write().await;
        if !steps.contains_key(path) {
            return Err(SteppeError::NotFound(format!("work step {}", path)));
        }
        if steps
            .values()
            .any(|s| s.parent_path.as_deref() == Some(path))
        {
            return Err(SteppeError::InvalidTransition(format!(
                "work step {} still has children",
                path
            )));
        }
        steps.remove(path);
        Ok(())
    }

    async fn get_work_step(&self, path: &str) -> Result<WorkStep> {
        self.steps
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| SteppeError::NotFound(format!("work step {}", path)))
    }

    async fn get_child_work_steps(&self, path: &str) -> Result<Vec<WorkStep>> {
        let mut children: Vec<WorkStep> = self
            .steps
            .read()
            .await
            .values()
            .filter(|s| s.parent_path.as_deref() == Some(path))
            .cloned()
            .collect();
        sort_by_ordinal(&mut children);
        Ok(children)
    }

    async fn exists_work_step(&self, path: &str) -> Result<bool> {
        Ok(self.steps.read().await.contains_key(path))
    }
}

#[async_trait]
impl WorkStepSnapshot for MemoryWorkStepRepository {
    async fn all_work_steps(&self) -> Result<Vec<WorkStep>> {
        let mut steps: Vec<WorkStep> = self.steps.read().await.values().cloned().collect();
        steps.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(steps)
    }
}

/// Work items held in a map keyed by id
#[derive(Default)]
pub struct MemoryWorkItemRepository {
    items: RwLock<HashMap<String, WorkItem>>,
}

impl MemoryWorkItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl WorkItemRepository for MemoryWorkItemRepository {
    async fn create_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(SteppeError::AlreadyExists(format!("work item {}", item.id)));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        match items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(SteppeError::NotFound(format!("work item {}", item.id))),
        }
    }

    async fn delete_work_item(&self, item: &WorkItem) -> Result<()> {
        self.items
            .write()
            .await
            .remove(&item.id)
            .map(|_| ())
            .ok_or_else(|| SteppeError::NotFound(format!("work item {}", item.id)))
    }

    async fn get_work_item(&self, id: &str) -> Result<WorkItem> {
        self.items
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SteppeError::NotFound(format!("work item {}", id)))
    }

    async fn get_work_items(&self, path: &str) -> Result<Vec<WorkItem>> {
        let mut found: Vec<WorkItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|wi| wi.path == path)
            .cloned()
            .collect();
        sort_by_arrival(&mut found);
        Ok(found)
    }

    async fn get_child_work_items(&self, parent_id: &str) -> Result<Vec<WorkItem>> {
        let mut children: Vec<WorkItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|wi| wi.parent_id() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(children)
    }

    async fn exists_work_item(&self, id: &str) -> Result<bool> {
        Ok(self.items.read().await.contains_key(id))
    }
}

#[async_trait]
impl WorkItemSnapshot for MemoryWorkItemRepository {
    async fn all_work_items(&self) -> Result<Vec<WorkItem>> {
        let mut items: Vec<WorkItem> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steppe_core::WorkStepType;

    async fn steps() -> MemoryWorkStepRepository {
        MemoryWorkStepRepository::with_steps(vec![
            WorkStep::root(),
            WorkStep::new("/review", 1, WorkStepType::Expand, "cr"),
            WorkStep::new("/todo", 0, WorkStepType::Begin, "cr"),
            WorkStep::new("/review/checklist", 0, WorkStepType::Normal, "cr"),
        ])
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_children_ordered_by_ordinal() {
        let repo = steps().await;
        let children = repo.get_child_work_steps("/").await.unwrap();
        let paths: Vec<&str> = children.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["/todo", "/review"]);
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let repo = steps().await;
        let orphan = WorkStep::new("/missing/child", 0, WorkStepType::Normal, "cr");
        assert!(matches!(
            repo.create_work_step(&orphan).await,
            Err(SteppeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_refuses_parent_with_children() {
        let repo = steps().await;
        assert!(repo.delete_work_step("/review").await.is_err());
        repo.delete_work_step("/review/checklist").await.unwrap();
        repo.delete_work_step("/review").await.unwrap();
        assert!(!repo.exists_work_step("/review").await.unwrap());
    }

    #[tokio::test]
    async fn test_item_duplicate_and_missing() {
        let repo = MemoryWorkItemRepository::new();
        let item = WorkItem::new("A", "/todo", vec!["cr".to_string()]);
        repo.create_work_item(&item).await.unwrap();
        assert!(matches!(
            repo.create_work_item(&item).await,
            Err(SteppeError::AlreadyExists(_))
        ));

        let ghost = WorkItem::new("B", "/todo", vec![]);
        assert!(matches!(
            repo.update_work_item(&ghost).await,
            Err(SteppeError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_work_item(&ghost).await,
            Err(SteppeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_items_listed_in_arrival_order() {
        let repo = MemoryWorkItemRepository::new();
        for (id, ordinal) in [("c", 0), ("a", 2), ("b", 1)] {
            let item = WorkItem::new(id, "/todo", vec![]).with_ordinal(ordinal);
            repo.create_work_item(&item).await.unwrap();
        }
        let ids: Vec<String> = repo
            .get_work_items("/todo")
            .await
            .unwrap()
            .into_iter()
            .map(|wi| wi.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
