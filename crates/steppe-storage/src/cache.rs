//! Write-through cache for the step table
//!
//! Steps change rarely (only when transient subtrees come and go) and are
//! read on every command, so reads are served from memory. Writes go to the
//! backing store first; the cache is updated only after the store accepted
//! the write, and the cache lock is held across both so readers never see a
//! step the store does not have.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use steppe_core::{Result, SteppeError, WorkStep};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::repository::{sort_by_ordinal, WorkStepRepository, WorkStepSnapshot};

/// Caching decorator over a step store
pub struct CachingWorkStepRepository<R> {
    inner: Arc<R>,
    steps: RwLock<HashMap<String, WorkStep>>,
}

impl<R: WorkStepSnapshot> CachingWorkStepRepository<R> {
    /// Warm the cache from the full table of `inner`
    pub async fn load(inner: Arc<R>) -> Result<Self> {
        let all = inner.all_work_steps().await?;
        info!("Loaded {} work steps into cache", all.len());

        let steps = all.into_iter().map(|s| (s.path.clone(), s)).collect();
        Ok(Self {
            inner,
            steps: RwLock::new(steps),
        })
    }

    /// The backing store
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }
}

#[async_trait]
impl<R: WorkStepSnapshot + 'static> WorkStepRepository for CachingWorkStepRepository<R> {
    async fn create_work_step(&self, step: &WorkStep) -> Result<()> {
        let mut steps = self.steps.write().await;
        if steps.contains_key(&step.path) {
            return Err(SteppeError::AlreadyExists(format!("work step {}", step.path)));
        }
        self.inner.create_work_step(step).await?;
        steps.insert(step.path.clone(), step.clone());
        debug!("Cached new work step {}", step.path);
        Ok(())
    }

    async fn update_work_step(&self, step: &WorkStep) -> Result<()> {
        let mut steps = self.steps.write().await;
        if !steps.contains_key(&step.path) {
            return Err(SteppeError::NotFound(format!("work step {}", step.path)));
        }
        self.inner.update_work_step(step).await?;
        steps.insert(step.path.clone(), step.clone());
        Ok(())
    }

    async fn delete_work_step(&self, path: &str) -> Result<()> {
        let mut steps = self.steps.write().await;
        self.inner.delete_work_step(path).await?;
        steps.remove(path);
        debug!("Evicted work step {}", path);
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
