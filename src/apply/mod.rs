//! Apply configuration schema
//!
//! Source tasks declare the desired state of Sumo Logic sources and are
//! executed idempotently by the [`executor::TaskExecutor`].

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod executor;
pub mod sumo_source;

pub use sumo_source::{SourceAction, SourceOutcome, SourceState, SumoSourceTask};

/// Main apply configuration schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// List of configuration operations to execute
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ApplyConfig {
    /// Append the tasks of another configuration file
    pub fn merge(&mut self, other: ApplyConfig) {
        self.tasks.extend(other.tasks);
    }
}

/// Types of configuration operations
///
/// These operations define desired remote state and are executed idempotently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Sumo Logic collector source management
    SumoSource(SumoSourceTask),
}

impl Task {
    /// Get the string representation of the task type
    pub fn task_type(&self) -> &'static str {
        match self {
            Task::SumoSource(_) => "sumo_source",
        }
    }

    /// Human readable label used in progress output
    pub fn label(&self) -> String {
        match self {
            Task::SumoSource(task) => task
                .description
                .clone()
                .unwrap_or_else(|| format!("sumo_source[{}]", task.name)),
        }
    }

    /// Validate the task definition
    pub fn validate(&self, task_index: usize) -> Result<()> {
        match self {
            Task::SumoSource(task) => task
                .validate()
                .map_err(|e| anyhow::anyhow!("Task {}: {}", task_index + 1, e)),
        }
    }
}
