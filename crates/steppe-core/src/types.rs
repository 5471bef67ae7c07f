//! Core type definitions for work steps and work items

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Result, SteppeError};

/// Path of the root step of every process graph
pub const ROOT_PATH: &str = "/";

/// Separator between a class and the suffix combined into it
pub const CLASS_SEPARATOR: char = '+';

/// Kind of a node in the process graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStepType {
    /// Entry point, the only place items are created
    Begin,
    /// Ordinary pass-through step
    #[default]
    Normal,
    /// Fans an entering item out into one item per child branch
    Parallel,
    /// Children are materialized per entering item
    Expand,
    /// Root of a subtree materialized for one item
    Transient,
    /// Terminal step
    End,
}

impl std::fmt::Display for WorkStepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Normal => write!(f, "normal"),
            Self::Parallel => write!(f, "parallel"),
            Self::Expand => write!(f, "expand"),
            Self::Transient => write!(f, "transient"),
            Self::End => write!(f, "end"),
        }
    }
}

impl std::str::FromStr for WorkStepType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "begin" => Ok(Self::Begin),
            "normal" => Ok(Self::Normal),
            "parallel" => Ok(Self::Parallel),
            "expand" => Ok(Self::Expand),
            "transient" => Ok(Self::Transient),
            "end" | "done" => Ok(Self::End),
            _ => Err(format!("Invalid step type: {}", s)),
        }
    }
}

/// Where a step came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepOrigin {
    /// Part of the declared process graph
    #[default]
    Static,
    /// Materialized when `owner` entered an expand step
    Transient { owner: String },
}

impl StepOrigin {
    /// Owning work item id for materialized steps
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::Static => None,
            Self::Transient { owner } => Some(owner),
        }
    }
}

/// A node in the process graph, keyed by its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkStep {
    pub path: String,
    pub parent_path: Option<String>,
    pub ordinal: u32,
    #[serde(rename = "type")]
    pub step_type: WorkStepType,
    pub work_item_class: String,
    #[serde(default)]
    pub origin: StepOrigin,
}

impl WorkStep {
    /// Create a static step; the parent path is derived from `path`
    pub fn new(
        path: impl Into<String>,
        ordinal: u32,
        step_type: WorkStepType,
        work_item_class: impl Into<String>,
    ) -> Self {
        let path = normalize_path(&path.into());
        let parent_path = parent_path_of(&path);
        Self {
            path,
            parent_path,
            ordinal,
            step_type,
            work_item_class: work_item_class.into(),
            origin: StepOrigin::Static,
        }
    }

    /// The root step
    pub fn root() -> Self {
        Self::new(ROOT_PATH, 0, WorkStepType::Normal, "")
    }

    pub fn with_origin(mut self, origin: StepOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_path.is_none()
    }

    /// True if `path` is this step or lies below it
    pub fn contains_path(&self, path: &str) -> bool {
        is_same_or_descendant(path, &self.path)
    }
}

/// Strip trailing slashes, keeping the root as `/`
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT_PATH.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Parent of a normalized path, `None` for the root
pub fn parent_path_of(path: &str) -> Option<String> {
    if path == ROOT_PATH {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT_PATH.to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => None,
    }
}

/// Join a child segment onto a normalized path
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{}", segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}

/// True if `path` equals `ancestor` or lies below it
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT_PATH {
        return path.starts_with('/');
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Helpers for class tags
pub struct WorkItemClass;

impl WorkItemClass {
    /// Combine a class with a suffix, e.g. `review` + `A` -> `review+A`
    pub fn combine(class: &str, suffix: &str) -> String {
        format!("{}{}{}", class, CLASS_SEPARATOR, suffix)
    }

    /// Proper prefixes of a combined class: `a+b+c` -> `[a, a+b]`
    pub fn root_classes(class: &str) -> Vec<String> {
        class
            .char_indices()
            .filter(|(_, c)| *c == CLASS_SEPARATOR)
            .map(|(idx, _)| class[..idx].to_string())
            .filter(|root| !root.is_empty())
            .collect()
    }
}

/// Lock status of a work item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Normal,
    /// Owns expansion children that have not all finished
    ExpandLocked,
    /// Split into parallel branches that have not merged back
    ParallelLocked,
}

impl WorkItemStatus {
    /// Validate a status change
    ///
    /// Staying in the same status is always allowed. The two lock states
    /// can only be entered from and left to `Normal`.
    pub fn transition_to(self, next: WorkItemStatus) -> Result<WorkItemStatus> {
        use WorkItemStatus::*;
        match (self, next) {
            (a, b) if a == b => Ok(next),
            (Normal, ExpandLocked)
            | (Normal, ParallelLocked)
            | (ExpandLocked, Normal)
            | (ParallelLocked, Normal) => Ok(next),
            (from, to) => Err(SteppeError::InvalidTransition(format!(
                "work item status cannot change from {} to {}",
                from, to
            ))),
        }
    }

    pub fn is_locked(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::ExpandLocked => write!(f, "expand_locked"),
            Self::ParallelLocked => write!(f, "parallel_locked"),
        }
    }
}

impl std::str::FromStr for WorkItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "expand_locked" | "expandlocked" => Ok(Self::ExpandLocked),
            "parallel_locked" | "parallellocked" => Ok(Self::ParallelLocked),
            _ => Err(format!("Invalid work item status: {}", s)),
        }
    }
}

/// Why a child item exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    /// Created inside the parent's transient subtree
    Expanded,
    /// One branch of the parent's parallel split
    Parallelled,
}

/// Link from a child item to the item that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemParent {
    pub id: String,
    pub kind: ParentKind,
}

impl WorkItemParent {
    pub fn expanded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ParentKind::Expanded,
        }
    }

    pub fn parallelled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ParentKind::Parallelled,
        }
    }
}

/// A unit of work flowing through the process graph
///
/// Work items are values: every change produces a new item that the caller
/// persists through a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub path: String,
    pub parent: Option<WorkItemParent>,
    pub ordinal: u32,
    pub status: WorkItemStatus,
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl WorkItem {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        classes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            parent: None,
            ordinal: 0,
            status: WorkItemStatus::Normal,
            classes: classes.into_iter().collect(),
            properties: BTreeMap::new(),
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.id.as_str())
    }

    pub fn move_to(mut self, step: &WorkStep) -> Self {
        self.path = step.path.clone();
        self
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_parent(mut self, parent: WorkItemParent) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Change status, rejecting combinations `transition_to` forbids
    pub fn with_status(mut self, status: WorkItemStatus) -> Result<Self> {
        let next = self.status.transition_to(status).map_err(|_| {
            SteppeError::InvalidTransition(format!(
                "work item {} cannot change from {} to {}",
                self.id, self.status, status
            ))
        })?;
        self.status = next;
        Ok(self)
    }

    pub fn add_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn remove_class(mut self, class: &str) -> Self {
        self.classes.remove(class);
        self
    }

    /// Merge property changes; an empty value removes the key
    pub fn with_properties(mut self, changes: &BTreeMap<String, String>) -> Self {
        for (key, value) in changes {
            if value.is_empty() {
                self.properties.remove(key);
            } else {
                self.properties.insert(key.clone(), value.clone());
            }
        }
        self
    }
}
