//! Declarative process graphs
//!
//! A process is declared as a flat list of steps keyed by path. Parents are
//! implied by the paths; the root `/` never needs to be declared.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::types::{normalize_path, parent_path_of, WorkStep, WorkStepType, ROOT_PATH};
use crate::{Result, SteppeError};

/// One declared step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub path: String,
    #[serde(rename = "type", default)]
    pub step_type: WorkStepType,
    #[serde(default)]
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
}

impl StepDefinition {
    pub fn new(path: impl Into<String>, step_type: WorkStepType, class: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            step_type,
            class: class.into(),
            ordinal: None,
        }
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }
}

/// The static process graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl ProcessDefinition {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }

    /// Validate the declaration and produce steps ordered parents-first
    pub fn into_work_steps(self) -> Result<Vec<WorkStep>> {
        let mut declared: Vec<WorkStep> = Vec::with_capacity(self.steps.len() + 1);
        let mut seen = HashSet::new();
        let mut next_ordinal: BTreeMap<String, u32> = BTreeMap::new();

        for def in self.steps {
            if !def.path.trim().starts_with('/') {
                return Err(SteppeError::Config(format!(
                    "step path must be absolute: '{}'",
                    def.path
                )));
            }
            let path = normalize_path(&def.path);
            if def.step_type == WorkStepType::Transient {
                return Err(SteppeError::Config(format!(
                    "transient steps cannot be declared: {}",
                    path
                )));
            }
            if path != ROOT_PATH && path.split('/').skip(1).any(str::is_empty) {
                return Err(SteppeError::Config(format!("empty path segment in '{}'", path)));
            }
            if !seen.insert(path.clone()) {
                return Err(SteppeError::Config(format!("duplicate step: {}", path)));
            }

            let parent = parent_path_of(&path).unwrap_or_default();
            let counter = next_ordinal.entry(parent).or_insert(0);
            let ordinal = def.ordinal.unwrap_or(*counter);
            *counter = (*counter).max(ordinal.saturating_add(1));

            declared.push(WorkStep::new(path, ordinal, def.step_type, def.class));
        }

        if !seen.contains(ROOT_PATH) {
            seen.insert(ROOT_PATH.to_string());
            declared.push(WorkStep::root());
        }

        for step in &declared {
            if let Some(parent) = &step.parent_path {
                if !seen.contains(parent) {
                    return Err(SteppeError::Config(format!(
                        "step {} has undeclared parent {}",
                        step.path, parent
                    )));
                }
            }
        }

        // Depth order puts every parent before its children
        declared.sort_by(|a, b| depth(&a.path).cmp(&depth(&b.path)).then(a.ordinal.cmp(&b.ordinal)));
        Ok(declared)
    }
}

fn depth(path: &str) -> usize {
    if path == ROOT_PATH {
        0
    } else {
        path.matches('/').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessDefinition {
        ProcessDefinition::new(vec![
            StepDefinition::new("/todo", WorkStepType::Begin, "cr"),
            StepDefinition::new("/doing", WorkStepType::Normal, "cr"),
            StepDefinition::new("/review", WorkStepType::Expand, "cr"),
            StepDefinition::new("/review/checklist", WorkStepType::Normal, "cr"),
            StepDefinition::new("/done", WorkStepType::End, "cr"),
        ])
    }

    #[test]
    fn test_root_is_implied_and_first() {
        let steps = sample().into_work_steps().unwrap();
        assert_eq!(steps[0].path, "/");
        assert_eq!(steps.len(), 6);
    }

    #[test]
    fn test_ordinals_follow_declaration_order() {
        let steps = sample().into_work_steps().unwrap();
        let ordinal = |p: &str| steps.iter().find(|s| s.path == p).unwrap().ordinal;
        assert_eq!(ordinal("/todo"), 0);
        assert_eq!(ordinal("/doing"), 1);
        assert_eq!(ordinal("/review"), 2);
        assert_eq!(ordinal("/done"), 3);
        assert_eq!(ordinal("/review/checklist"), 0);
    }

    #[test]
    fn test_parents_come_before_children() {
        let steps = sample().into_work_steps().unwrap();
        let pos = |p: &str| steps.iter().position(|s| s.path == p).unwrap();
        assert!(pos("/review") < pos("/review/checklist"));
    }

    #[test]
    fn test_rejects_missing_parent() {
        let def = ProcessDefinition::new(vec![StepDefinition::new(
            "/review/checklist",
            WorkStepType::Normal,
            "cr",
        )]);
        assert!(matches!(def.into_work_steps(), Err(SteppeError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicates_and_transient() {
        let dup = ProcessDefinition::new(vec![
            StepDefinition::new("/todo", WorkStepType::Begin, "cr"),
            StepDefinition::new("/todo/", WorkStepType::Begin, "cr"),
        ]);
        assert!(dup.into_work_steps().is_err());

        let transient = ProcessDefinition::new(vec![StepDefinition::new(
            "/x",
            WorkStepType::Transient,
            "cr",
        )]);
        assert!(transient.into_work_steps().is_err());
    }

    #[test]
    fn test_rejects_relative_path() {
        let def = ProcessDefinition::new(vec![StepDefinition::new("todo", WorkStepType::Begin, "cr")]);
        assert!(def.into_work_steps().is_err());
    }
}
