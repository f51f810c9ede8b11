//! Apply task executor
//!
//! This module handles the actual execution of the source tasks defined in
//! the apply configuration, against one collector client per run.

use crate::apply::sumo_source::{execute_sumo_source_task, SourceAction, SourceOutcome};
use crate::apply::{ApplyConfig, Task};
use crate::sumologic::Collector;
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Counts of the actions taken during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} removed, {} unchanged, {} skipped",
            self.created, self.updated, self.removed, self.unchanged, self.skipped
        )
    }
}

impl ExecutionSummary {
    fn record(&mut self, outcome: SourceOutcome) {
        match outcome.action {
            SourceAction::Create => self.created += 1,
            SourceAction::Update => self.updated += 1,
            SourceAction::Remove => self.removed += 1,
            SourceAction::Unchanged => self.unchanged += 1,
            SourceAction::Skipped => self.skipped += 1,
        }
    }
}

/// Executor for apply tasks
pub struct TaskExecutor {
    dry_run: bool,
    disabled: bool,
}

impl TaskExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            disabled: false,
        }
    }

    /// Skip every task without contacting the API
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Execute a single task
    pub async fn execute_single_task(
        &mut self,
        task: &Task,
        collector: &mut Collector,
    ) -> Result<SourceOutcome> {
        if self.disabled {
            debug!(
                task = %task.label(),
                "Skipping sumo source declaration as source management is disabled"
            );
            return Ok(SourceOutcome {
                action: SourceAction::Skipped,
                dry_run: self.dry_run,
            });
        }

        match task {
            Task::SumoSource(source_task) => {
                execute_sumo_source_task(source_task, collector, self.dry_run).await
            }
        }
    }

    /// Execute all tasks in the configuration
    pub async fn execute(
        &mut self,
        config: &ApplyConfig,
        collector: &mut Collector,
    ) -> Result<ExecutionSummary> {
        println!(
            "Executing {} tasks{}",
            config.tasks.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut summary = ExecutionSummary::default();
        for (i, task) in config.tasks.iter().enumerate() {
            println!(
                "Executing task {} of {}: {}",
                i + 1,
                config.tasks.len(),
                task.label()
            );

            let outcome = self.execute_single_task(task, collector).await?;
            summary.record(outcome);
        }

        println!(
            "All tasks completed{}: {}",
            if self.dry_run { " (dry run)" } else { "" },
            summary
        );
        Ok(summary)
    }

    /// Validate tasks without executing them
    pub fn validate(&self, config: &ApplyConfig) -> Result<()> {
        println!("Validating {} tasks", config.tasks.len());

        let mut names = HashSet::new();
        for (i, task) in config.tasks.iter().enumerate() {
            task.validate(i)?;

            let Task::SumoSource(source_task) = task;
            if !names.insert(source_task.name.as_str()) {
                return Err(anyhow::anyhow!(
                    "Task {}: sumo source '{}' is declared more than once",
                    i + 1,
                    source_task.name
                ));
            }
        }

        println!("All tasks validated successfully");
        Ok(())
    }
}
