//! The workflow orchestrator
//!
//! `Workflow` exposes the two commands, create and update, and drives every
//! transition behind them: parallel split and merge, transient subtree
//! materialization and removal, and expand lock propagation.
//!
//! A move is planned in memory first and only committed once the final
//! `(item, step)` pair is known to be valid, so a rejected command never
//! leaves partial writes behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use steppe_core::{
    join_path, normalize_path, ProcessDefinition, Result, StepOrigin, SteppeError, WorkItem,
    WorkItemClass, WorkItemParent, WorkItemStatus, WorkStep, WorkStepType, CLASS_SEPARATOR,
};
use steppe_storage::{WorkItemRepository, WorkStepRepository};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::item_query::WorkItemQuery;
use crate::keyed_lock::{family_key, item_key, transient_key, KeyedGuard, KeyedLocks};
use crate::parallel::{ParallelSplit, ParallelStepHelper};
use crate::step_query::{is_container, WorkStepQuery};

/// Rounds of lock acquisition before giving up on an item that keeps moving
const MAX_LOCK_ATTEMPTS: usize = 16;

/// Steps materialized for one item entering an expand step
struct TransientPlan {
    root: WorkStep,
    /// Parents before children
    descendants: Vec<WorkStep>,
}

impl TransientPlan {
    fn steps(&self) -> impl Iterator<Item = &WorkStep> {
        std::iter::once(&self.root).chain(self.descendants.iter())
    }

    /// Leaf an item lands on inside the planned subtree
    fn leaf(&self) -> &WorkStep {
        let mut current = &self.root;
        while is_container(current.step_type) {
            let first = self
                .descendants
                .iter()
                .filter(|s| s.parent_path.as_deref() == Some(current.path.as_str()))
                .min_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.path.cmp(&b.path)));
            match first {
                Some(step) => current = step,
                None => break,
            }
        }
        current
    }
}

/// Everything a move will write
struct MovePlan {
    split: Option<ParallelSplit>,
    /// Persisted branch items removed by a merge
    merged: Vec<WorkItem>,
    materialized: Option<TransientPlan>,
    /// Steps of a subtree the item leaves, children first
    abandoned: Vec<WorkStep>,
    /// The item that ends up at `target`
    moving: WorkItem,
    /// Set when `moving` is a branch item that does not exist yet
    moving_is_new: bool,
    target: WorkStep,
    /// Expansion parent whose lock status changes
    expand_parent: Option<WorkItem>,
}

/// Orchestrates work items over a process graph
pub struct Workflow {
    steps: Arc<dyn WorkStepRepository>,
    items: Arc<dyn WorkItemRepository>,
    step_query: WorkStepQuery,
    item_query: WorkItemQuery,
    parallel: ParallelStepHelper,
    locks: KeyedLocks,
    /// Held while ordinals are assigned and plans are written
    placement: Mutex<()>,
}

impl Workflow {
    pub fn new(steps: Arc<dyn WorkStepRepository>, items: Arc<dyn WorkItemRepository>) -> Self {
        let step_query = WorkStepQuery::new(steps.clone());
        let item_query = WorkItemQuery::new(steps.clone(), items.clone());
        let parallel = ParallelStepHelper::new(step_query.clone());
        Self {
            steps,
            items,
            step_query,
            item_query,
            parallel,
            locks: KeyedLocks::new(),
            placement: Mutex::new(()),
        }
    }

    pub fn step_query(&self) -> &WorkStepQuery {
        &self.step_query
    }

    pub fn item_query(&self) -> &WorkItemQuery {
        &self.item_query
    }

    /// Write a declared process graph into the step repository
    ///
    /// Steps that already exist are updated in place. Returns the number of
    /// steps written.
    #[instrument(skip(self, process), fields(declared = process.steps.len()))]
    pub async fn install_process(&self, process: ProcessDefinition) -> Result<usize> {
        let steps = process.into_work_steps()?;
        for step in &steps {
            if self.steps.exists_work_step(&step.path).await? {
                self.steps.update_work_step(step).await?;
            } else {
                self.steps.create_work_step(step).await?;
            }
        }
        info!(count = steps.len(), "Installed process");
        Ok(steps.len())
    }

    pub async fn get_work_item(&self, id: &str) -> Result<WorkItem> {
        self.items.get_work_item(id).await
    }

    /// Items at a step in arrival order, without items parked by a split
    pub async fn get_work_items(&self, path: &str) -> Result<Vec<WorkItem>> {
        let path = normalize_path(path);
        Ok(self
            .items
            .get_work_items(&path)
            .await?
            .into_iter()
            .filter(|wi| !self.item_query.is_parallel_locked_work_item(wi))
            .collect())
    }

    /// Create a work item at the begin step `path` resolves to
    #[instrument(skip(self))]
    pub async fn create_work_item(&self, id: &str, path: &str) -> Result<WorkItem> {
        let result = self.try_create(id, path).await;
        match &result {
            Ok(item) => info!(path = %item.path, ordinal = item.ordinal, "Created work item"),
            Err(e) => debug!(error = %e, "Rejected work item creation"),
        }
        result
    }

    /// Move a work item and/or change its properties
    ///
    /// The item moves only if `path` resolves to a step other than the one it
    /// occupies. Property changes are applied to the item the move ends with,
    /// which is the unlocked parent when the move completes a merge. Returns
    /// that item.
    #[instrument(skip(self, changes), fields(changes = changes.len()))]
    pub async fn update_work_item(
        &self,
        id: &str,
        path: &str,
        changes: &BTreeMap<String, String>,
    ) -> Result<WorkItem> {
        let result = self.try_update(id, path, changes).await;
        match &result {
            Ok(item) => info!(
                item = %item.id,
                path = %item.path,
                ordinal = item.ordinal,
                "Updated work item"
            ),
            Err(e) => debug!(error = %e, "Rejected work item update"),
        }
        result
    }

    async fn try_create(&self, id: &str, path: &str) -> Result<WorkItem> {
        validate_id(id)?;
        let leaf = self.step_query.get_leaf_step(path).await?;
        if leaf.step_type != WorkStepType::Begin {
            return Err(SteppeError::InvalidTransition(format!(
                "work items can only be created at a begin step, {} is {}",
                leaf.path, leaf.step_type
            )));
        }

        let transient = self.step_query.is_within_transient_step(&leaf).await?;
        if transient.is_none() && self.step_query.is_within_expand_step(&leaf).await? {
            return Err(SteppeError::InvalidTransition(format!(
                "cannot create work items under {} before its expand step is entered",
                leaf.path
            )));
        }

        let mut keys = BTreeSet::from([item_key(id)]);
        if let Some(root) = &transient {
            keys.insert(transient_key(&root.path));
            keys.insert(family_key(owner_of(root)?));
        }
        let _guard = self.locks.lock(keys).await;

        if self.items.exists_work_item(id).await? {
            return Err(SteppeError::AlreadyExists(format!("work item {}", id)));
        }

        let mut item = WorkItem::new(id, leaf.path.clone(), self.step_query.get_work_item_classes(&leaf));
        let mut owner_update = None;

        if let Some(root) = &transient {
            // The owner may have left and taken the subtree with it
            if !self.steps.exists_work_step(&root.path).await? {
                return Err(SteppeError::NotFound(format!("work step {}", root.path)));
            }
            let owner = self.find_subtree_owner(root).await?;
            let locked = owner.clone().with_status(WorkItemStatus::ExpandLocked)?;
            if locked != owner {
                owner_update = Some(locked);
            }
            item = with_root_classes(item.with_parent(WorkItemParent::expanded(owner.id)));
        }

        let _placement = self.placement.lock().await;
        if let Some(owner) = owner_update {
            self.items.update_work_item(&owner).await?;
            debug!(owner = %owner.id, "Expand-locked owner");
        }
        self.place(item, true).await
    }

    async fn try_update(
        &self,
        id: &str,
        path: &str,
        changes: &BTreeMap<String, String>,
    ) -> Result<WorkItem> {
        let (item, to_step, _guard) = self.lock_for_move(id, path).await?;

        let mut current = if item.path != to_step.path {
            self.move_work_item(item, to_step).await?
        } else {
            item
        };

        if !changes.is_empty() {
            current = current.with_properties(changes);
            self.items.update_work_item(&current).await?;
            debug!(item = %current.id, "Applied property changes");
        }
        Ok(current)
    }

    /// Lock everything a move of `id` towards `path` may touch
    ///
    /// Keys depend on where the item is, which can change while we wait, so
    /// the item is re-read under the locks and the attempt repeated if the
    /// held keys no longer cover it.
    async fn lock_for_move(&self, id: &str, path: &str) -> Result<(WorkItem, WorkStep, KeyedGuard)> {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let item = self.locate(id).await?;
            let to_step = self.step_query.get_leaf_step(path).await?;
            let guard = self.locks.lock(self.move_keys(&item, &to_step).await?).await;

            let item = self.locate(id).await?;
            let to_step = self.step_query.get_leaf_step(path).await?;
            if guard.covers(&self.move_keys(&item, &to_step).await?) {
                return Ok((item, to_step, guard));
            }
            debug!(item = %id, "Lock keys changed while waiting, retrying");
        }
        Err(SteppeError::ConsistencyFault(format!(
            "work item {} kept changing while acquiring locks",
            id
        )))
    }

    async fn move_keys(&self, item: &WorkItem, to_step: &WorkStep) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::from([item_key(&item.id), family_key(&item.id)]);
        if let Some(parent_id) = item.parent_id() {
            keys.insert(family_key(parent_id));
            // A merge continues with the parent, which may have a parent of its own
            if let Some(parent) = self.item_query.try_locate_work_item(parent_id).await? {
                if let Some(grandparent) = parent.parent_id() {
                    keys.insert(family_key(grandparent));
                }
            }
        }
        if let Some(root) = self.step_query.is_in_transient_step(item).await? {
            keys.insert(transient_key(&root.path));
        }
        if self.step_query.is_expand_step(to_step) {
            keys.insert(transient_key(&to_step.path));
        }
        Ok(keys)
    }

    async fn locate(&self, id: &str) -> Result<WorkItem> {
        self.item_query
            .try_locate_work_item(id)
            .await?
            .ok_or_else(|| SteppeError::NotFound(format!("work item {}", id)))
    }

    async fn move_work_item(&self, item: WorkItem, to_step: WorkStep) -> Result<WorkItem> {
        let plan = self.plan_move(&item, &to_step).await?;
        self.commit_move(plan).await
    }

    /// Work out every write a move implies
    ///
    /// A pending merge is settled before an expand step is materialized, so a
    /// subtree is always created for the item that actually lands there.
    async fn plan_move(&self, item: &WorkItem, to_step: &WorkStep) -> Result<MovePlan> {
        if self.item_query.is_parallel_locked_work_item(item) {
            return Err(SteppeError::LockedForParallelWork(item.id.clone()));
        }
        if self.item_query.is_expand_locked(item) {
            return Err(SteppeError::LockedForExpansion(item.id.clone()));
        }
        if self.step_query.is_within_transient_step(to_step).await?.is_none()
            && self.step_query.is_within_expand_step(to_step).await?
        {
            return Err(SteppeError::InvalidTransition(format!(
                "{} lies under an expand step that {} has not entered",
                to_step.path, item.id
            )));
        }

        let mut moving = item.clone();
        let mut moving_is_new = false;

        let mut split = None;
        if let Some(parallel) = self.step_query.is_within_parallel_step(to_step).await? {
            if !self.item_query.is_child_of_parallelled_work_item(item) {
                let planned = self.parallel.split_for_parallelism(item, &parallel).await?;
                for branch in &planned.branches {
                    if self.items.exists_work_item(&branch.id).await? {
                        return Err(SteppeError::AlreadyExists(format!("work item {}", branch.id)));
                    }
                }
                let branch_id =
                    ParallelStepHelper::parallel_id(&item.id, &parallel.path, &to_step.path);
                let branch = branch_id
                    .and_then(|id| planned.branch(&id).cloned())
                    .ok_or_else(|| {
                        SteppeError::ConsistencyFault(format!(
                            "no branch of {} leads to {}",
                            parallel.path, to_step.path
                        ))
                    })?;
                debug!(
                    item = %item.id,
                    parallel = %parallel.path,
                    branches = planned.branches.len(),
                    "Splitting for parallel work"
                );
                moving = branch;
                moving_is_new = true;
                split = Some(planned);
            }
        }

        let mut merged = Vec::new();
        if self.item_query.is_child_of_parallelled_work_item(&moving) {
            if let Some(parent_id) = moving.parent_id().map(str::to_string) {
                let siblings = match &split {
                    Some(planned) => planned.branches.clone(),
                    None => self.item_query.get_parallel_branches(&parent_id).await?,
                };
                let mergeable = siblings
                    .iter()
                    .filter(|s| s.id != moving.id)
                    .all(|s| s.path == to_step.path);
                if mergeable {
                    let parent = match split.take() {
                        // Split and merged in one move, nothing of the split is written
                        Some(planned) => {
                            moving_is_new = false;
                            planned.parent
                        }
                        None => {
                            merged = siblings;
                            self.items.get_work_item(&parent_id).await?
                        }
                    };
                    debug!(parent = %parent_id, at = %to_step.path, "Merging parallel work");
                    moving = parent.with_status(WorkItemStatus::Normal)?;
                }
            }
        }

        let mut target = to_step.clone();
        let mut materialized = None;
        if self.step_query.is_expand_step(to_step) {
            let root_path = join_path(&to_step.path, &moving.id);
            if self.steps.exists_work_step(&root_path).await? {
                let existing = self.steps.get_work_step(&root_path).await?;
                if existing.origin.owner() != Some(moving.id.as_str()) {
                    return Err(SteppeError::AlreadyExists(format!("work step {}", root_path)));
                }
                debug!(root = %root_path, "Re-entering transient step");
                target = self.step_query.get_leaf_step(&root_path).await?;
            } else {
                let plan = self.plan_transient_steps(&moving.id, to_step).await?;
                debug!(
                    root = %root_path,
                    steps = plan.descendants.len() + 1,
                    "Materializing transient steps"
                );
                target = plan.leaf().clone();
                materialized = Some(plan);
            }
            let subtree_class = WorkItemClass::combine(&to_step.work_item_class, &moving.id);
            moving = moving.add_class(subtree_class);
        }

        if !self.step_query.is_valid_work_step_for_work_item(&moving, &target) {
            return Err(SteppeError::InvalidTransition(format!(
                "work item {} is not valid at {} (class {})",
                moving.id, target.path, target.work_item_class
            )));
        }

        let mut abandoned = Vec::new();
        if let Some(current_root) = self.step_query.is_in_transient_step(item).await? {
            let owned = matches!(
                current_root.origin.owner(),
                Some(owner) if owner == item.id || owner == moving.id
            );
            if owned && !current_root.contains_path(&target.path) {
                debug!(root = %current_root.path, "Leaving transient step");
                moving = moving.remove_class(&current_root.work_item_class);
                if let Some(planned) = split.as_mut() {
                    planned.parent.classes.remove(&current_root.work_item_class);
                    for branch in &mut planned.branches {
                        branch.classes.remove(&current_root.work_item_class);
                    }
                }
                abandoned = self.step_query.get_descendants(&current_root).await?;
                abandoned.insert(0, current_root);
                abandoned.reverse();
            }
        }

        let expand_parent = self.plan_expand_lock(&moving, &target).await?;

        Ok(MovePlan {
            split,
            merged,
            materialized,
            abandoned,
            moving,
            moving_is_new,
            target,
            expand_parent,
        })
    }

    /// New status for the expansion parent of `moving` once it sits at `target`
    async fn plan_expand_lock(&self, moving: &WorkItem, target: &WorkStep) -> Result<Option<WorkItem>> {
        if !self.item_query.is_child_of_expanded_work_item(moving) {
            return Ok(None);
        }
        let Some(parent_id) = moving.parent_id() else {
            return Ok(None);
        };
        let parent = self.items.get_work_item(parent_id).await?;

        // Once the parent has left its subtree its children no longer hold it
        let occupied = self.step_query.is_in_transient_step(&parent).await?;
        if !matches!(&occupied, Some(root) if root.origin.owner() == Some(parent.id.as_str())) {
            return Ok(None);
        }

        let mut all_done = target.step_type == WorkStepType::End;
        if all_done {
            for sibling in self.item_query.get_expansion_children(parent_id).await? {
                if sibling.id == moving.id {
                    continue;
                }
                // Left behind by an earlier expansion whose steps are gone
                if !self.item_query.occupies_existing_step(&sibling).await? {
                    continue;
                }
                if !self.item_query.is_done(&sibling).await? {
                    all_done = false;
                    break;
                }
            }
        }

        let next = if all_done {
            WorkItemStatus::Normal
        } else {
            WorkItemStatus::ExpandLocked
        };
        if self.item_query.is_parallel_locked_work_item(&parent) || parent.status == next {
            return Ok(None);
        }
        debug!(parent = %parent.id, status = %next, "Recomputed expand lock");
        Ok(Some(parent.with_status(next)?))
    }

    /// Mirror the static children of `expand` below `{expand}/{owner}`
    async fn plan_transient_steps(&self, owner: &str, expand: &WorkStep) -> Result<TransientPlan> {
        let origin = StepOrigin::Transient {
            owner: owner.to_string(),
        };
        let root = WorkStep::new(
            join_path(&expand.path, owner),
            expand.ordinal,
            WorkStepType::Transient,
            WorkItemClass::combine(&expand.work_item_class, owner),
        )
        .with_origin(origin.clone());

        let mut descendants = Vec::new();
        let mut stack = vec![(expand.path.clone(), root.path.clone())];
        while let Some((source, mirror)) = stack.pop() {
            for child in self.step_query.get_child_work_steps(&source).await? {
                // Subtrees of other items are not part of the template
                if child.step_type == WorkStepType::Transient {
                    continue;
                }
                let segment = child.path.rsplit('/').next().unwrap_or_default();
                let path = join_path(&mirror, segment);
                stack.push((child.path.clone(), path.clone()));
                descendants.push(
                    WorkStep::new(
                        path,
                        child.ordinal,
                        child.step_type,
                        WorkItemClass::combine(&child.work_item_class, owner),
                    )
                    .with_origin(origin.clone()),
                );
            }
        }
        Ok(TransientPlan { root, descendants })
    }

    async fn commit_move(&self, plan: MovePlan) -> Result<WorkItem> {
        let MovePlan {
            split,
            merged,
            materialized,
            abandoned,
            moving,
            moving_is_new,
            target,
            expand_parent,
        } = plan;

        let _placement = self.placement.lock().await;

        if let Some(transient) = &materialized {
            for step in transient.steps() {
                self.steps.create_work_step(step).await?;
            }
        }

        if let Some(split) = split {
            self.place(split.parent, false).await?;
            for branch in split.branches {
                if branch.id != moving.id {
                    self.place(branch, true).await?;
                }
            }
        }

        for branch in &merged {
            self.items.delete_work_item(branch).await?;
        }

        let moved = self.place(moving.move_to(&target), moving_is_new).await?;

        for step in &abandoned {
            self.steps.delete_work_step(&step.path).await?;
        }

        if let Some(parent) = expand_parent {
            self.items.update_work_item(&parent).await?;
        }

        Ok(moved)
    }

    /// Assign the next ordinal at the item's path and persist it
    ///
    /// Callers hold `placement`.
    async fn place(&self, item: WorkItem, is_new: bool) -> Result<WorkItem> {
        let ordinal = self.item_query.next_ordinal(&item).await?;
        let item = item.with_ordinal(ordinal);
        if is_new {
            self.items.create_work_item(&item).await?;
        } else {
            self.items.update_work_item(&item).await?;
        }
        Ok(item)
    }

    /// The one item in a transient subtree that is not a child of its owner
    async fn find_subtree_owner(&self, root: &WorkStep) -> Result<WorkItem> {
        let owner_id = owner_of(root)?;
        let mut paths = vec![root.path.clone()];
        paths.extend(
            self.step_query
                .get_descendants(root)
                .await?
                .into_iter()
                .map(|s| s.path),
        );

        let mut occupants = Vec::new();
        for path in &paths {
            occupants.extend(
                self.items
                    .get_work_items(path)
                    .await?
                    .into_iter()
                    .filter(|wi| wi.parent_id() != Some(owner_id)),
            );
        }

        match occupants.as_slice() {
            [owner] if owner.id == owner_id => Ok(owner.clone()),
            _ => Err(SteppeError::ConsistencyFault(format!(
                "transient step {} should hold exactly its owner {}, found [{}]",
                root.path,
                owner_id,
                occupants
                    .iter()
                    .map(|wi| wi.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

fn owner_of(root: &WorkStep) -> Result<&str> {
    root.origin.owner().ok_or_else(|| {
        SteppeError::ConsistencyFault(format!("transient step {} has no owner", root.path))
    })
}

/// Ids become path segments and class suffixes
fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() || id.contains('/') || id.contains(CLASS_SEPARATOR) {
        return Err(SteppeError::InvalidTransition(format!(
            "invalid work item id {:?}",
            id
        )));
    }
    Ok(())
}

fn with_root_classes(mut item: WorkItem) -> WorkItem {
    let roots: Vec<String> = item
        .classes
        .iter()
        .flat_map(|c| WorkItemClass::root_classes(c))
        .collect();
    item.classes.extend(roots);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use steppe_storage::{MemoryWorkItemRepository, MemoryWorkStepRepository};

    async fn workflow(steps: Vec<WorkStep>) -> Workflow {
        let steps = MemoryWorkStepRepository::with_steps(steps).await.unwrap();
        Workflow::new(Arc::new(steps), Arc::new(MemoryWorkItemRepository::new()))
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("A").is_ok());
        assert!(validate_id("cr-17").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a+b").is_err());
    }

    #[test]
    fn test_with_root_classes() {
        let item = WorkItem::new("C", "/x", vec!["cr+A+C".to_string()]);
        let item = with_root_classes(item);
        assert!(item.classes.contains("cr"));
        assert!(item.classes.contains("cr+A"));
        assert!(item.classes.contains("cr+A+C"));
    }

    #[tokio::test]
    async fn test_transient_plan_mirrors_static_children_only() {
        let wf = workflow(vec![
            WorkStep::root(),
            WorkStep::new("/review", 0, WorkStepType::Expand, "cr"),
            WorkStep::new("/review/checklist", 0, WorkStepType::Normal, "cr"),
            WorkStep::new("/review/checklist/read", 0, WorkStepType::Normal, "cr"),
            WorkStep::new("/review/signoff", 1, WorkStepType::End, "cr"),
            WorkStep::new("/review/B", 0, WorkStepType::Transient, "cr+B").with_origin(
                StepOrigin::Transient {
                    owner: "B".to_string(),
                },
            ),
        ])
        .await;
        let expand = wf.step_query().get_work_step("/review").await.unwrap();
        let plan = wf.plan_transient_steps("A", &expand).await.unwrap();

        assert_eq!(plan.root.path, "/review/A");
        assert_eq!(plan.root.work_item_class, "cr+A");
        assert_eq!(plan.root.origin.owner(), Some("A"));

        let mut paths: Vec<&str> = plan.descendants.iter().map(|s| s.path.as_str()).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec!["/review/A/checklist", "/review/A/checklist/read", "/review/A/signoff"]
        );
        assert!(plan
            .descendants
            .iter()
            .all(|s| s.work_item_class == "cr+A" && s.origin.owner() == Some("A")));
        assert_eq!(plan.leaf().path, "/review/A/checklist/read");
    }

    #[tokio::test]
    async fn test_rejected_move_writes_nothing() {
        let wf = workflow(vec![
            WorkStep::root(),
            WorkStep::new("/todo", 0, WorkStepType::Begin, "cr"),
            // Entering grants `review+A`, but the mirrored leaf wants `audit+A`
            WorkStep::new("/review", 1, WorkStepType::Expand, "review"),
            WorkStep::new("/review/checklist", 0, WorkStepType::Normal, "audit"),
        ])
        .await;
        wf.create_work_item("A", "/todo").await.unwrap();

        let err = wf
            .update_work_item("A", "/review", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SteppeError::InvalidTransition(_)));
        assert!(!wf.steps.exists_work_step("/review/A").await.unwrap());
        assert_eq!(wf.get_work_item("A").await.unwrap().path, "/todo");
    }
}
