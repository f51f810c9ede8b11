//! Sumo Logic source task executor
//!
//! Reconciles one source of the local collector against its declaration. The
//! remote source is classified once from the collector's source listing:
//!
//! - absent: the source is created
//! - divergent: at least one of `path`, `category`, `default_timezone`,
//!   `force_timezone` or `blacklist` differs, and the whole source is replaced
//! - matching: nothing is sent
//!
//! # Examples
//!
//! ## Ship application logs
//!
//! This example ships the application logs, skipping rotated archives.
//!
//! **YAML Format:**
//! ```yaml
//! - type: sumo_source
//!   description: "Ship application logs"
//!   name: app-logs
//!   path: /var/log/app/*.log
//!   category: prod/app
//!   blacklist:
//!     - "*.gz"
//! ```
//!
//! **JSON Format:**
//! ```json
//! {
//!   "type": "sumo_source",
//!   "description": "Ship application logs",
//!   "name": "app-logs",
//!   "path": "/var/log/app/*.log",
//!   "category": "prod/app",
//!   "blacklist": ["*.gz"]
//! }
//! ```
//!
//! **TOML Format:**
//! ```toml
//! [[tasks]]
//! type = "sumo_source"
//! description = "Ship application logs"
//! name = "app-logs"
//! path = "/var/log/app/*.log"
//! category = "prod/app"
//! blacklist = ["*.gz"]
//! ```
//!
//! ## Force a timezone and retry on API errors
//!
//! With `timeout` set, failed API calls are retried for up to that many
//! seconds.
//!
//! **YAML Format:**
//! ```yaml
//! - type: sumo_source
//!   name: syslog
//!   path: /var/log/syslog
//!   category: os/syslog
//!   default_timezone: UTC
//!   force_timezone: true
//!   timeout: 120
//! ```
//!
//! **JSON Format:**
//! ```json
//! {
//!   "type": "sumo_source",
//!   "name": "syslog",
//!   "path": "/var/log/syslog",
//!   "category": "os/syslog",
//!   "default_timezone": "UTC",
//!   "force_timezone": true,
//!   "timeout": 120
//! }
//! ```
//!
//! **TOML Format:**
//! ```toml
//! [[tasks]]
//! type = "sumo_source"
//! name = "syslog"
//! path = "/var/log/syslog"
//! category = "os/syslog"
//! default_timezone = "UTC"
//! force_timezone = true
//! timeout = 120
//! ```

use crate::sumologic::{Collector, RetryPolicy, Source, SourceSpec, SumoError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Sumo source state enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Ensure the source exists with the declared attributes
    #[default]
    Present,
    /// Ensure the source does not exist (not implemented for existing sources)
    Absent,
}

/// Sumo Logic source management task
///
/// Declares a source on the local collector. Only the tracked attributes
/// (`path`, `category`, `default_timezone`, `force_timezone`, `blacklist`)
/// decide whether an existing source needs to be replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumoSourceTask {
    /// Optional description of what this task does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Source name, unique per collector
    pub name: String,
    /// Source state
    #[serde(default)]
    pub state: SourceState,
    /// Path expression of the files to collect
    #[serde(default)]
    pub path: String,
    /// Source category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Time zone used when log lines carry none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timezone: Option<String>,
    /// Ignore time zones found in log lines
    #[serde(default)]
    pub force_timezone: bool,
    /// Path expressions excluded from collection
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Sumo source type
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Description stored on the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_description: Option<String>,
    /// Host name reported for collected messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    /// Retry budget in seconds for write calls (single attempt when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Default source type ("LocalFile")
pub fn default_source_type() -> String {
    "LocalFile".to_string()
}

impl SumoSourceTask {
    /// Present source with default settings
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            description: None,
            name: name.into(),
            state: SourceState::Present,
            path: path.into(),
            category: None,
            default_timezone: None,
            force_timezone: false,
            blacklist: Vec::new(),
            source_type: default_source_type(),
            source_description: None,
            host_name: None,
            timeout: None,
        }
    }

    /// Create/update payload for this declaration
    pub fn to_source_spec(&self) -> SourceSpec {
        SourceSpec {
            name: self.name.clone(),
            source_type: self.source_type.clone(),
            path_expression: self.path.clone(),
            category: self.category.clone(),
            time_zone: self.default_timezone.clone(),
            force_time_zone: self.force_timezone,
            blacklist: self.blacklist.clone(),
            description: self.source_description.clone(),
            host_name: self.host_name.clone(),
        }
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        RetryPolicy::from_secs(self.timeout)
    }

    /// Check the declaration before any API call
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("sumo source name cannot be empty");
        }
        if self.state == SourceState::Present && self.path.trim().is_empty() {
            anyhow::bail!("sumo source '{}' path cannot be empty", self.name);
        }
        if self.source_type.is_empty() {
            anyhow::bail!("sumo source '{}' source_type cannot be empty", self.name);
        }
        if self.blacklist.iter().any(|entry| entry.trim().is_empty()) {
            anyhow::bail!(
                "sumo source '{}' blacklist entries cannot be empty",
                self.name
            );
        }
        if self.timeout == Some(0) {
            anyhow::bail!(
                "sumo source '{}' timeout must be greater than zero",
                self.name
            );
        }
        Ok(())
    }
}

/// Attributes compared between the declaration and the remote source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    Path,
    Category,
    DefaultTimezone,
    ForceTimezone,
    Blacklist,
}

impl fmt::Display for SourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceField::Path => "path",
            SourceField::Category => "category",
            SourceField::DefaultTimezone => "default_timezone",
            SourceField::ForceTimezone => "force_timezone",
            SourceField::Blacklist => "blacklist",
        };
        f.write_str(name)
    }
}

/// One differing attribute, rendered for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: SourceField,
    pub current: String,
    pub desired: String,
}

/// Differences between a remote source and its declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDiff {
    pub changes: Vec<FieldChange>,
}

impl SourceDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn fields(&self) -> Vec<SourceField> {
        self.changes.iter().map(|c| c.field).collect()
    }

    fn push(&mut self, field: SourceField, current: String, desired: String) {
        self.changes.push(FieldChange {
            field,
            current,
            desired,
        });
    }
}

impl fmt::Display for SourceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(
                f,
                "value of {} will change from '{}' to '{}'",
                change.field, change.current, change.desired
            )?;
        }
        Ok(())
    }
}

fn show(value: Option<&str>) -> String {
    value.unwrap_or("").to_string()
}

/// Compare the tracked attributes of `current` against `desired`
pub fn diff_source(current: &Source, desired: &SumoSourceTask) -> SourceDiff {
    let mut diff = SourceDiff::default();

    if current.path_expression.as_deref() != Some(desired.path.as_str()) {
        diff.push(
            SourceField::Path,
            show(current.path_expression.as_deref()),
            desired.path.clone(),
        );
    }
    if current.category != desired.category {
        diff.push(
            SourceField::Category,
            show(current.category.as_deref()),
            show(desired.category.as_deref()),
        );
    }
    if current.time_zone != desired.default_timezone {
        diff.push(
            SourceField::DefaultTimezone,
            show(current.time_zone.as_deref()),
            show(desired.default_timezone.as_deref()),
        );
    }
    if current.force_time_zone != desired.force_timezone {
        diff.push(
            SourceField::ForceTimezone,
            current.force_time_zone.to_string(),
            desired.force_timezone.to_string(),
        );
    }
    if current.blacklist != desired.blacklist {
        diff.push(
            SourceField::Blacklist,
            format!("{:?}", current.blacklist),
            format!("{:?}", desired.blacklist),
        );
    }

    diff
}

/// State of a declared source on the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Absent,
    Matching { id: u64 },
    Divergent { id: u64, diff: SourceDiff },
}

/// Classify the remote source (if any) against the declaration
pub fn classify(current: Option<&Source>, desired: &SumoSourceTask) -> SourceStatus {
    match current {
        None => SourceStatus::Absent,
        Some(source) => {
            let diff = diff_source(source, desired);
            if diff.is_empty() {
                SourceStatus::Matching { id: source.id }
            } else {
                SourceStatus::Divergent {
                    id: source.id,
                    diff,
                }
            }
        }
    }
}

/// Action taken (or planned, in dry-run mode) for a source task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    Create,
    Update,
    Remove,
    Unchanged,
    /// Source management is disabled
    Skipped,
}

/// Result of a source task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOutcome {
    pub action: SourceAction,
    pub dry_run: bool,
}

impl SourceOutcome {
    fn new(action: SourceAction, dry_run: bool) -> Self {
        Self { action, dry_run }
    }

    /// Whether the remote state was modified
    pub fn changed(&self) -> bool {
        !self.dry_run && matches!(self.action, SourceAction::Create | SourceAction::Update)
    }
}

/// Execute a sumo source task
pub async fn execute_sumo_source_task(
    task: &SumoSourceTask,
    collector: &mut Collector,
    dry_run: bool,
) -> Result<SourceOutcome> {
    match task.state {
        SourceState::Present => ensure_source_present(task, collector, dry_run).await,
        SourceState::Absent => ensure_source_absent(task, collector, dry_run).await,
    }
}

async fn current_source(collector: &mut Collector, name: &str) -> Result<Option<Source>> {
    let source = collector
        .source(name)
        .await
        .with_context(|| format!("Failed to read sumo source '{}'", name))?;
    Ok(source.cloned())
}

/// Create or replace the source so it matches the declaration
async fn ensure_source_present(
    task: &SumoSourceTask,
    collector: &mut Collector,
    dry_run: bool,
) -> Result<SourceOutcome> {
    let current = current_source(collector, &task.name).await?;

    match classify(current.as_ref(), task) {
        SourceStatus::Matching { .. } => {
            println!("Sumo source '{}' is up to date", task.name);
            Ok(SourceOutcome::new(SourceAction::Unchanged, dry_run))
        }
        SourceStatus::Absent => {
            let spec = task.to_source_spec();
            println!(
                "Add sumo source '{}' via api (path: {})",
                task.name, task.path
            );
            if dry_run {
                println!("Would add sumo source '{}'", task.name);
                return Ok(SourceOutcome::new(SourceAction::Create, true));
            }

            collector
                .add_source(&spec, task.retry_policy())
                .await
                .with_context(|| format!("Failed to add sumo source '{}'", task.name))?;
            collector
                .refresh()
                .await
                .with_context(|| format!("Failed to refresh sources after adding '{}'", task.name))?;

            info!(source = %task.name, collector = %collector.name(), "Added sumo source");
            Ok(SourceOutcome::new(SourceAction::Create, false))
        }
        SourceStatus::Divergent { id, diff } => {
            let spec = task.to_source_spec();
            print!("Replace sumo source '{}' via api\n{}", task.name, diff);
            if dry_run {
                println!("Would replace sumo source '{}' (id {})", task.name, id);
                return Ok(SourceOutcome::new(SourceAction::Update, true));
            }

            collector
                .update_source(id, &spec, task.retry_policy())
                .await
                .with_context(|| format!("Failed to replace sumo source '{}'", task.name))?;
            collector
                .refresh()
                .await
                .with_context(|| {
                    format!("Failed to refresh sources after replacing '{}'", task.name)
                })?;

            info!(
                source = %task.name,
                source_id = id,
                changed = ?diff.fields(),
                "Replaced sumo source"
            );
            Ok(SourceOutcome::new(SourceAction::Update, false))
        }
    }
}

/// Removal is declared but not implemented: an existing source is an error.
/// A missing collector has no sources, so there is nothing to remove.
async fn ensure_source_absent(
    task: &SumoSourceTask,
    collector: &mut Collector,
    dry_run: bool,
) -> Result<SourceOutcome> {
    let collector_exists = collector
        .exists()
        .await
        .with_context(|| format!("Failed to read sumo source '{}'", task.name))?;
    if !collector_exists {
        println!(
            "Sumo source '{}' is already absent (collector '{}' not found)",
            task.name,
            collector.name()
        );
        return Ok(SourceOutcome::new(SourceAction::Unchanged, dry_run));
    }

    let Some(current) = current_source(collector, &task.name).await? else {
        println!("Sumo source '{}' is already absent", task.name);
        return Ok(SourceOutcome::new(SourceAction::Unchanged, dry_run));
    };

    println!("Removing sumo source '{}' (id {})", task.name, current.id);
    if dry_run {
        println!("Would remove sumo source '{}'", task.name);
        return Ok(SourceOutcome::new(SourceAction::Remove, true));
    }

    Err(anyhow::Error::new(SumoError::NotImplemented("Sumo source removal"))
        .context(format!("Failed to remove sumo source '{}'", task.name)))
}
