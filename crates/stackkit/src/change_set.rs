//! Change sets: the computed diff between local and deployed state.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Change, ChangeSetDescription, Replacement};
use crate::wait::Waiter;
use chrono::{DateTime, Utc};

/// Prefix of every generated change set name.
pub const NAME_PREFIX: &str = "stacker";

/// A change set created for one stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    name: String,
    id: String,
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(name: impl Into<String>, id: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            changes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote identifier (ARN) of the change set.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Summaries of changes that remove or replace resources.
    pub fn destructive(&self) -> Vec<String> {
        destructive_changes(&self.changes)
    }
}

/// Change set name for a creation instant, e.g. `stacker-20240301100000`.
pub fn generate_name(now: DateTime<Utc>) -> String {
    format!("{NAME_PREFIX}-{}", now.format("%Y%m%d%H%M%S"))
}

/// One-line description of a change.
pub fn summarize(change: &Change) -> String {
    let rc = &change.resource_change;
    let mut line = format!("{} {}", rc.action, rc.logical_resource_id);
    if let Some(resource_type) = &rc.resource_type {
        line = format!("{line} ({resource_type})");
    }
    match rc.replacement {
        Some(Replacement::True) => line.push_str(" [replace]"),
        Some(Replacement::Conditional) => line.push_str(" [may replace]"),
        _ => {}
    }
    line
}

pub fn destructive_changes(changes: &[Change]) -> Vec<String> {
    changes
        .iter()
        .filter(|c| c.is_destructive())
        .map(summarize)
        .collect()
}

/// Poll until the change set has finished computing.
///
/// A `FAILED` change set is reported as a validation failure carrying its
/// status reason.
pub(crate) fn wait_until_ready(
    backend: &dyn Backend,
    waiter: &Waiter<'_>,
    stack: &str,
    change_set: &str,
) -> Result<ChangeSetDescription> {
    loop {
        let description = backend.describe_change_set(stack, change_set)?;
        if description.is_pending() {
            waiter.check(&description.status)?;
            waiter.pause();
            continue;
        }
        if description.is_failed() {
            return Err(Error::Validation(description.status_reason.unwrap_or_else(
                || format!("change set {change_set} failed"),
            )));
        }
        return Ok(description);
    }
}
