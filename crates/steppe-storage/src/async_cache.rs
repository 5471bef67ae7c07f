//! Caching item repository with asynchronous replication
//!
//! Reads and writes are served from memory; every write is also queued on a
//! `Replicator` that pushes it to the backing store in the background. The
//! cache lock is held while a write is queued, so the queue order matches the
//! order in which writes became visible to readers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use steppe_core::{ReplicationConfig, Result, SteppeError, WorkItem};
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::replication::{DeadLetter, ItemMutation, ReplicationStats, Replicator};
use crate::repository::{sort_by_arrival, WorkItemRepository, WorkItemSnapshot};

/// Read-your-write item cache in front of a slower store
pub struct AsyncCachingWorkItemRepository {
    items: RwLock<HashMap<String, WorkItem>>,
    replicator: Replicator,
}

impl AsyncCachingWorkItemRepository {
    /// Warm the cache from `inner` and start replicating to it
    ///
    /// The returned receiver yields mutations the store never accepted.
    pub async fn load<R>(
        inner: Arc<R>,
        config: &ReplicationConfig,
    ) -> Result<(Self, mpsc::Receiver<DeadLetter>)>
    where
        R: WorkItemSnapshot + 'static,
    {
        let all = inner.all_work_items().await?;
        info!("Loaded {} work items into cache", all.len());

        let items = all.into_iter().map(|wi| (wi.id.clone(), wi)).collect();
        let (replicator, dead_letters) = Replicator::spawn(inner, config);

        Ok((
            Self {
                items: RwLock::new(items),
                replicator,
            },
            dead_letters,
        ))
    }

    /// Wait until all writes made so far reached the store or were dead-lettered
    pub async fn flush(&self) {
        self.replicator.flush().await;
    }

    pub fn replication_stats(&self) -> ReplicationStats {
        self.replicator.stats()
    }

    /// Stop replicating after draining queued writes
    pub async fn shutdown(self) -> Result<ReplicationStats> {
        self.replicator.shutdown().await
    }
}

#[async_trait]
impl WorkItemRepository for AsyncCachingWorkItemRepository {
    async fn create_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(SteppeError::AlreadyExists(format!("work item {}", item.id)));
        }
        self.replicator
            .submit(ItemMutation::Create(item.clone()))
            .await?;
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        if !items.contains_key(&item.id) {
            return Err(SteppeError::NotFound(format!("work item {}", item.id)));
        }
        self.replicator
            .submit(ItemMutation::Update(item.clone()))
            .await?;
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        if !items.contains_key(&item.id) {
            return Err(SteppeError::NotFound(format!("work item {}", item.id)));
        }
        self.replicator
            .submit(ItemMutation::Delete(item.clone()))
            .await?;
        items.remove(&item.id);
        Ok(())
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
