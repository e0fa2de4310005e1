//! Core types for CloudFormation stacks.
//!
//! Field names follow the CloudFormation API (PascalCase on the wire) so the
//! same types deserialize `aws cloudformation` output and serialize its
//! `--cli-input-json` requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural phase of a remote stack status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    /// `*_COMPLETE`, including a finished rollback
    Complete,
    /// `*ROLLBACK_IN_PROGRESS`
    RollbackInProgress,
    /// `*_IN_PROGRESS` other than a rollback
    InProgress,
    /// `*_FAILED`
    Failed,
    /// Anything else
    Unknown,
}

/// A stack status string as reported by CloudFormation.
///
/// The set of statuses is owned by the remote API, so this stays an opaque
/// string classified by suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackStatus(String);

impl StackStatus {
    /// Wrap a raw status string.
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// The raw status string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the status by suffix.
    pub fn phase(&self) -> StatusPhase {
        let s = self.0.as_str();
        if s.ends_with("ROLLBACK_IN_PROGRESS") {
            StatusPhase::RollbackInProgress
        } else if s.ends_with("_IN_PROGRESS") {
            StatusPhase::InProgress
        } else if s.ends_with("_COMPLETE") {
            StatusPhase::Complete
        } else if s.ends_with("_FAILED") {
            StatusPhase::Failed
        } else {
            StatusPhase::Unknown
        }
    }

    /// Whether the status is a `*_COMPLETE` variant.
    pub fn is_complete(&self) -> bool {
        self.0.ends_with("_COMPLETE")
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for StackStatus {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StackStatus {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A stack output value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A parameter key/value pair, as sent to and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterEntry {
    pub parameter_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_value: Option<String>,
}

impl ParameterEntry {
    /// Create an entry with a value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter_key: key.into(),
            parameter_value: Some(value.into()),
        }
    }
}

/// Remote description of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub stack_name: String,
    #[serde(default)]
    pub stack_id: Option<String>,
    pub stack_status: StackStatus,
    #[serde(default)]
    pub stack_status_reason: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
}

impl StackDescription {
    /// Create a minimal description with a name and status.
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            stack_name: name.into(),
            stack_id: None,
            stack_status: StackStatus::new(status),
            stack_status_reason: None,
            description: None,
            creation_time: None,
            last_updated_time: None,
            outputs: Vec::new(),
            capabilities: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Add an output.
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.push(StackOutput {
            output_key: key.into(),
            output_value: value.into(),
            description: None,
        });
        self
    }

    /// Add a remote parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(ParameterEntry::new(key, value));
        self
    }

    /// Add a granted capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Set the status reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.stack_status_reason = Some(reason.into());
        self
    }
}

/// One entry of a stack's event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_status: Option<String>,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
}

impl StackEvent {
    /// Create an event for a resource with a status and reason.
    pub fn new(
        logical_id: impl Into<String>,
        status: impl Into<String>,
        reason: Option<&str>,
    ) -> Self {
        Self {
            event_id: None,
            timestamp: None,
            logical_resource_id: Some(logical_id.into()),
            resource_type: None,
            resource_status: Some(status.into()),
            resource_status_reason: reason.map(str::to_string),
        }
    }

    /// Whether the event records a failed resource operation.
    pub fn is_failure(&self) -> bool {
        self.resource_status
            .as_deref()
            .is_some_and(|s| s.ends_with("_FAILED"))
    }
}

/// Action a change set takes on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
    Import,
    Dynamic,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeAction::Add => "Add",
            ChangeAction::Modify => "Modify",
            ChangeAction::Remove => "Remove",
            ChangeAction::Import => "Import",
            ChangeAction::Dynamic => "Dynamic",
            ChangeAction::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Whether a modification replaces the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Replacement {
    True,
    False,
    Conditional,
    #[serde(other)]
    Unknown,
}

/// A single resource change inside a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceChange {
    pub action: ChangeAction,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub replacement: Option<Replacement>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

/// A change set entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
    #[serde(rename = "Type", default)]
    pub change_type: Option<String>,
    pub resource_change: ResourceChange,
}

impl Change {
    /// Create a resource change with an action and replacement indicator.
    pub fn resource(
        logical_id: impl Into<String>,
        action: ChangeAction,
        replacement: Option<Replacement>,
    ) -> Self {
        Self {
            change_type: Some("Resource".to_string()),
            resource_change: ResourceChange {
                action,
                logical_resource_id: logical_id.into(),
                physical_resource_id: None,
                resource_type: None,
                replacement,
                scope: Vec::new(),
                details: Vec::new(),
            },
        }
    }

    /// Whether applying the change deletes or replaces a resource.
    pub fn is_destructive(&self) -> bool {
        self.resource_change.action == ChangeAction::Remove
            || self.resource_change.replacement == Some(Replacement::True)
    }
}

/// Remote description of a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSetDescription {
    #[serde(default)]
    pub change_set_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl ChangeSetDescription {
    /// A change set that finished computing with the given changes.
    pub fn complete(changes: Vec<Change>) -> Self {
        Self {
            change_set_name: None,
            status: "CREATE_COMPLETE".to_string(),
            status_reason: None,
            execution_status: Some("AVAILABLE".to_string()),
            changes,
        }
    }

    /// Whether CloudFormation is still computing the change set.
    pub fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "CREATE_PENDING" | "CREATE_IN_PROGRESS")
    }

    /// Whether the change set could not be computed.
    pub fn is_failed(&self) -> bool {
        self.status == "FAILED"
    }
}

/// Request body for `CreateStack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// Request body for `CreateChangeSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateChangeSetRequest {
    pub stack_name: String,
    pub change_set_name: String,
    pub template_body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    pub change_set_type: String,
}
