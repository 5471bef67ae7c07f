//! Asynchronous replication of item writes to a backing store
//!
//! The caching item repository applies writes to memory immediately and
//! hands them to a `Replicator`. A single worker task drains the queue in
//! FIFO order, so writes to the same item reach the store in the order they
//! were made.
//!
//! ```text
//! ┌──────────────────────────┐  submit   ┌──────────────┐
//! │ AsyncCachingWorkItemRepo │ ────────► │ mpsc queue   │
//! └──────────────────────────┘           └──────┬───────┘
//!                                               │ worker (one task)
//!                                               ▼
//!                              retry_with_backoff + timeout
//!                               │                       │
//!                            applied             exhausted
//!                               │                       ▼
//!                               ▼              dead-letter channel
//!                        backing store          + error! event
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use steppe_core::{retry_with_backoff, ReplicationConfig, Result, SteppeError, WorkItem};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::repository::WorkItemRepository;

/// A write to replay against the backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "item", rename_all = "snake_case")]
pub enum ItemMutation {
    Create(WorkItem),
    Update(WorkItem),
    Delete(WorkItem),
}

impl ItemMutation {
    pub fn item(&self) -> &WorkItem {
        match self {
            Self::Create(item) | Self::Update(item) | Self::Delete(item) => item,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    /// Apply to `repo`, tolerating the leftovers of an attempt that timed
    /// out after the store had already accepted it
    pub async fn apply<R: WorkItemRepository + ?Sized>(&self, repo: &R) -> Result<()> {
        match self {
            Self::Create(item) => match repo.create_work_item(item).await {
                Err(SteppeError::AlreadyExists(_)) => repo.update_work_item(item).await,
                other => other,
            },
            Self::Update(item) => repo.update_work_item(item).await,
            Self::Delete(item) => match repo.delete_work_item(item).await {
                Err(SteppeError::NotFound(_)) => Ok(()),
                other => other,
            },
        }
    }
}

/// A mutation the backing store never accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub mutation: ItemMutation,
    pub error: String,
    pub attempts: usize,
    pub failed_at: DateTime<Utc>,
}

/// Counters for replication activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Mutations accepted by `submit`
    pub submitted: u64,
    /// Mutations the backing store accepted
    pub applied: u64,
    /// Extra attempts spent on mutations that eventually succeeded or failed
    pub retried: u64,
    /// Mutations given up on
    pub dead_lettered: u64,
}

impl ReplicationStats {
    /// Returns true if any mutation was dead-lettered
    pub fn has_errors(&self) -> bool {
        self.dead_lettered > 0
    }

    /// Mutations submitted but not yet applied or dead-lettered
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.applied + self.dead_lettered)
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    applied: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Owner of the replication worker task
pub struct Replicator {
    tx: mpsc::Sender<ItemMutation>,
    progress: watch::Receiver<u64>,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl Replicator {
    /// Start the worker for `inner`
    ///
    /// Returns the replicator and the dead-letter receiver; the receiver is
    /// the operator channel for mutations that could not be replicated.
    pub fn spawn<R>(inner: Arc<R>, config: &ReplicationConfig) -> (Self, mpsc::Receiver<DeadLetter>)
    where
        R: WorkItemRepository + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel::<ItemMutation>(config.queue_capacity.max(1));
        let (dead_tx, dead_rx) = mpsc::channel::<DeadLetter>(config.dead_letter_capacity.max(1));
        let (progress_tx, progress) = watch::channel(0u64);
        let counters = Arc::new(Counters::default());

        let worker = {
            let counters = counters.clone();
            let policy = config.retry_policy();
            tokio::spawn(async move {
                let mut rx = rx;
                let mut completed = 0u64;

                while let Some(mutation) = rx.recv().await {
                    let operation = format!(
                        "replicate {} of work item {}",
                        mutation.kind(),
                        mutation.item().id
                    );

                    match retry_with_backoff(&operation, &policy, || mutation.apply(inner.as_ref()))
                        .await
                    {
                        Ok(((), attempts)) => {
                            counters.applied.fetch_add(1, Ordering::Relaxed);
                            counters
                                .retried
                                .fetch_add(attempts as u64 - 1, Ordering::Relaxed);
                            debug!("{} applied after {} attempt(s)", operation, attempts);
                        }
                        Err(exhausted) => {
                            counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                            counters
                                .retried
                                .fetch_add(exhausted.attempts as u64 - 1, Ordering::Relaxed);

                            let letter = DeadLetter {
                                mutation: mutation.clone(),
                                error: exhausted.error.to_string(),
                                attempts: exhausted.attempts,
                                failed_at: Utc::now(),
                            };
                            let payload = serde_json::to_string(&letter.mutation)
                                .unwrap_or_else(|e| format!("<unserializable: {}>", e));
                            error!(
                                mutation = %payload,
                                attempts = exhausted.attempts,
                                "{} dead-lettered: {}",
                                operation,
                                exhausted.error
                            );
                            if let Err(e) = dead_tx.try_send(letter) {
                                error!("Dead-letter channel unavailable: {}", e);
                            }
                        }
                    }

                    completed += 1;
                    // Nobody may be waiting on progress
                    let _ = progress_tx.send(completed);
                }

                info!("Replication queue closed after {} mutation(s)", completed);
            })
        };

        (
            Self {
                tx,
                progress,
                counters,
                worker,
            },
            dead_rx,
        )
    }

    /// Queue a mutation, waiting for room if the queue is full
    pub async fn submit(&self, mutation: ItemMutation) -> Result<()> {
        self.tx.send(mutation).await.map_err(|e| {
            SteppeError::Replication(format!(
                "replicator stopped, dropped {} of work item {}",
                e.0.kind(),
                e.0.item().id
            ))
        })?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Wait until every mutation submitted so far was applied or dead-lettered
    pub async fn flush(&self) {
        let target = self.counters.submitted.load(Ordering::Relaxed);
        let mut progress = self.progress.clone();
        loop {
            if *progress.borrow_and_update() >= target {
                return;
            }
            if progress.changed().await.is_err() {
                // Worker is gone; nothing further will complete
                return;
            }
        }
    }

    pub fn stats(&self) -> ReplicationStats {
        ReplicationStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            applied: self.counters.applied.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dead_lettered: self.counters.dead_lettered.load(Ordering::Relaxed),
        }
    }

    /// Close the queue, let the worker drain it, and return final counters
    pub async fn shutdown(self) -> Result<ReplicationStats> {
        let Self {
            tx,
            counters,
            worker,
            ..
        } = self;
        drop(tx);
        worker
            .await
            .map_err(|e| SteppeError::Replication(format!("replication worker failed: {}", e)))?;

        Ok(ReplicationStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            applied: counters.applied.load(Ordering::Relaxed),
            retried: counters.retried.load(Ordering::Relaxed),
            dead_lettered: counters.dead_lettered.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorkItemRepository;

    fn fast_config() -> ReplicationConfig {
        ReplicationConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            timeout_ms: 100,
            ..Default::default()
        }
    }

    fn item(id: &str, path: &str) -> WorkItem {
        WorkItem::new(id, path, vec!["cr".to_string()])
    }

    #[tokio::test]
    async fn test_mutations_apply_in_order() {
        let store = Arc::new(MemoryWorkItemRepository::new());
        let (replicator, _dead) = Replicator::spawn(store.clone(), &fast_config());

        replicator
            .submit(ItemMutation::Create(item("A", "/todo")))
            .await
            .unwrap();
        replicator
            .submit(ItemMutation::Update(item("A", "/doing")))
            .await
            .unwrap();
        replicator.flush().await;

        assert_eq!(store.get_work_item("A").await.unwrap().path, "/doing");
        let stats = replicator.shutdown().await.unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.pending(), 0);
    }

    #[tokio::test]
    async fn test_unreplicable_mutation_is_dead_lettered() {
        let store = Arc::new(MemoryWorkItemRepository::new());
        let (replicator, mut dead) = Replicator::spawn(store.clone(), &fast_config());

        // Update of an item the store never saw
        replicator
            .submit(ItemMutation::Update(item("ghost", "/todo")))
            .await
            .unwrap();
        replicator.flush().await;

        let letter = dead.recv().await.unwrap();
        assert_eq!(letter.attempts, 3);
        assert_eq!(letter.mutation.item().id, "ghost");

        let stats = replicator.stats();
        assert!(stats.has_errors());
        assert_eq!(stats.retried, 2);
    }

    #[tokio::test]
    async fn test_create_retry_tolerates_existing_item() {
        let store = Arc::new(MemoryWorkItemRepository::new());
        store.create_work_item(&item("A", "/todo")).await.unwrap();

        ItemMutation::Create(item("A", "/doing"))
            .apply(store.as_ref())
            .await
            .unwrap();
        assert_eq!(store.get_work_item("A").await.unwrap().path, "/doing");

        let delete = ItemMutation::Delete(item("A", "/doing"));
        delete.apply(store.as_ref()).await.unwrap();
        delete.apply(store.as_ref()).await.unwrap();
    }

    #[test]
    fn test_mutation_serializes_with_op_tag() {
        let json = serde_json::to_value(ItemMutation::Delete(item("A", "/todo"))).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["item"]["id"], "A");
    }
}
