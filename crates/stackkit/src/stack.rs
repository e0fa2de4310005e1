//! The stack lifecycle: create, update, and wait for a settled status.
//!
//! A [`Stack`] caches its remote description until [`Stack::invalidate`] is
//! called. The wait loop invalidates before every read, so it always sees
//! fresh status.

use crate::backend::Backend;
use crate::capabilities::{CapabilityDiff, CapabilitySet};
use crate::change_set::{self, ChangeSet};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Operation, Result, is_stack_policy_denial};
use crate::parameter::ParameterSet;
use crate::region::Region;
use crate::template::{StaticTemplate, TemplateSource};
use crate::types::{
    Change, CreateChangeSetRequest, CreateStackRequest, ParameterEntry, StackDescription,
    StackStatus, StatusPhase,
};
use crate::wait::{WaitOptions, Waiter};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Events read when diagnosing a rollback.
const ROLLBACK_EVENT_LIMIT: usize = 30;

/// How [`Stack::update`] proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Wait for the update to settle
    pub blocking: bool,
    /// Execute change sets that remove or replace resources
    pub allow_destructive: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            blocking: true,
            allow_destructive: false,
        }
    }
}

/// One named stack in a region.
pub struct Stack {
    region: Arc<Region>,
    name: String,
    template: Box<dyn TemplateSource>,
    parameters: ParameterSet,
    capabilities: CapabilitySet,
    wait: WaitOptions,
    description: Option<StackDescription>,
    change_set: Option<ChangeSet>,
}

impl Stack {
    /// A stack with an empty template, no parameters and no capabilities.
    pub fn new(region: Arc<Region>, name: impl Into<String>) -> Self {
        Self {
            region,
            name: name.into(),
            template: Box::new(StaticTemplate::default()),
            parameters: ParameterSet::new(),
            capabilities: CapabilitySet::default(),
            wait: WaitOptions::default(),
            description: None,
            change_set: None,
        }
    }

    pub fn with_template(mut self, template: impl TemplateSource + 'static) -> Self {
        self.template = Box::new(template);
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn diagnostics(&self) -> &dyn Diagnostics {
        self.region.diagnostics()
    }

    /// Run a read-only call with the configured read retries.
    fn read<T>(&self, mut op: impl FnMut(&dyn Backend) -> Result<T>) -> Result<T> {
        let retries = self.wait.read_retry.max_attempts.saturating_sub(1);
        self.wait.read_retry.run(
            self.region.clock(),
            |retry, error, delay| {
                self.diagnostics().warn(&format!(
                    "{}: {error}, retrying in {}s ({retry}/{retries})",
                    self.name,
                    delay.as_secs()
                ));
            },
            || op(self.region.backend()),
        )
    }

    /// Drop the cached description so the next access reads it again.
    pub fn invalidate(&mut self) {
        self.description = None;
    }

    /// The remote description, fetched on first access.
    ///
    /// An absent stack is not cached.
    pub fn description(&mut self) -> Result<Option<&StackDescription>> {
        if self.description.is_none() {
            self.description = self.read(|backend| backend.describe_stack(&self.name))?;
        }
        Ok(self.description.as_ref())
    }

    pub fn exists(&mut self) -> Result<bool> {
        Ok(self.description()?.is_some())
    }

    pub fn status(&mut self) -> Result<Option<StackStatus>> {
        Ok(self.description()?.map(|d| d.stack_status.clone()))
    }

    pub fn status_reason(&mut self) -> Result<Option<String>> {
        Ok(self.description()?.and_then(|d| d.stack_status_reason.clone()))
    }

    pub fn creation_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.description()?.and_then(|d| d.creation_time))
    }

    pub fn last_updated_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.description()?.and_then(|d| d.last_updated_time))
    }

    /// Output values by key. Empty unless the stack is in a complete state.
    pub fn outputs(&mut self) -> Result<BTreeMap<String, String>> {
        Ok(match self.description()? {
            Some(d) if d.stack_status.is_complete() => d
                .outputs
                .iter()
                .map(|o| (o.output_key.clone(), o.output_value.clone()))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    /// Required template parameters with no local value.
    pub fn missing(&self) -> Result<Vec<String>> {
        Ok(self.parameters.missing(&self.template.render()?))
    }

    /// Local parameters whose value differs from the deployed stack.
    ///
    /// `None` when the stack does not exist.
    pub fn parameter_changes(&mut self) -> Result<Option<Vec<String>>> {
        let Some(description) = self.description()?.cloned() else {
            return Ok(None);
        };
        self.parameters
            .changed(&self.region, &description)
            .map(Some)
    }

    /// Drift between declared and granted capabilities.
    ///
    /// `None` when the stack does not exist.
    pub fn capability_diff(&mut self) -> Result<Option<CapabilityDiff>> {
        let Some(description) = self.description()?.cloned() else {
            return Ok(None);
        };
        Ok(Some(self.capabilities.diff(&description)))
    }

    /// Create the stack, optionally waiting for it to settle.
    ///
    /// An existing stack is left alone.
    pub fn create(&mut self, blocking: bool) -> Result<()> {
        if self.exists()? {
            self.diagnostics().warn("Stack already exists");
            return Ok(());
        }

        let template = self.template.render()?;
        let missing = self.parameters.missing(&template);
        if !missing.is_empty() {
            return Err(Error::MissingParameters(missing));
        }

        let request = CreateStackRequest {
            stack_name: self.name.clone(),
            template_body: serde_json::to_string(&template)?,
            parameters: self
                .parameters
                .resolved_all(&self.region)?
                .into_iter()
                .map(|(key, value)| ParameterEntry::new(key, value))
                .collect(),
            capabilities: self.capabilities.local(),
        };

        self.diagnostics()
            .info(&format!("Creating stack {}", self.name));
        self.region
            .backend()
            .create_stack(&request)
            .map_err(|e| e.classify(Operation::Create))?;
        self.invalidate();

        if blocking {
            self.wait_while_status("CREATE_IN_PROGRESS")?;
        }
        Ok(())
    }

    /// Update the stack through a change set.
    pub fn update(&mut self, options: UpdateOptions) -> Result<()> {
        self.try_update(options)
            .map_err(|e| e.classify(Operation::Update))
    }

    fn try_update(&mut self, options: UpdateOptions) -> Result<()> {
        let missing = self.missing()?;
        if !missing.is_empty() {
            return Err(Error::MissingParameters(missing));
        }

        let change_set = self.change_set()?;
        let change_set_name = change_set.name().to_string();
        let destructive = change_set.destructive();

        if !options.allow_destructive && !destructive.is_empty() {
            self.diagnostics().fatal(&format!(
                "Refusing to execute {change_set_name}: {}",
                destructive.join(", ")
            ));
            return Err(Error::DestructiveChanges(destructive));
        }

        self.diagnostics()
            .info(&format!("Updating stack {}", self.name));
        self.region
            .backend()
            .execute_change_set(&self.name, &change_set_name)?;
        self.invalidate();

        if options.blocking {
            self.wait_while_status("UPDATE_IN_PROGRESS")?;
        }
        Ok(())
    }

    /// The change set for this stack, created on first use.
    ///
    /// Change sets are never deleted, even when left unexecuted.
    pub fn change_set(&mut self) -> Result<&ChangeSet> {
        let change_set = match self.change_set.take() {
            Some(change_set) => change_set,
            None => self.compute_change_set()?,
        };
        Ok(self.change_set.insert(change_set))
    }

    /// Resource changes the change set would apply.
    pub fn describe_change_set(&mut self) -> Result<Vec<Change>> {
        Ok(self.change_set()?.changes().to_vec())
    }

    fn compute_change_set(&self) -> Result<ChangeSet> {
        let template = self.template.render()?;
        let name = change_set::generate_name(Utc::now());

        let request = CreateChangeSetRequest {
            stack_name: self.name.clone(),
            change_set_name: name.clone(),
            template_body: serde_json::to_string(&template)?,
            parameters: self.parameters.local_all(&self.region)?,
            capabilities: self.capabilities.local(),
            change_set_type: "UPDATE".to_string(),
        };

        self.diagnostics()
            .info(&format!("Creating change set {name} for {}", self.name));
        let id = self.region.backend().create_change_set(&request)?;

        let waiter = Waiter::start(self.region.clock(), &self.wait, &self.name);
        let description =
            change_set::wait_until_ready(self.region.backend(), &waiter, &self.name, &name)?;
        Ok(ChangeSet::new(name, id, description.changes))
    }

    /// Poll until the status moves away from `expected` and settles.
    ///
    /// Returns once a `*_COMPLETE` status is reached. Rollbacks and
    /// `*_FAILED` statuses become errors; other in-progress statuses keep
    /// the loop running.
    pub fn wait_while_status(&mut self, expected: &str) -> Result<()> {
        let region = Arc::clone(&self.region);
        let options = self.wait.clone();
        let name = self.name.clone();
        let diagnostics = region.diagnostics();
        let waiter = Waiter::start(region.clock(), &options, &name);

        waiter.grace();
        let mut last = String::new();
        loop {
            waiter.check(&last)?;
            self.invalidate();
            let status = self
                .status()?
                .ok_or_else(|| Error::Failed(format!("Stack [{name}] disappeared while waiting")))?;
            let report = format!("{name} Status => {status}");

            if status == expected {
                diagnostics.debug(&report);
                waiter.pause();
                last = status.to_string();
                continue;
            }

            match status.phase() {
                StatusPhase::Complete => {
                    diagnostics.info(&report);
                    return Ok(());
                }
                StatusPhase::RollbackInProgress => {
                    return Err(self.rollback_failure(&status));
                }
                StatusPhase::Failed => {
                    let reason = self.status_reason()?.unwrap_or_default();
                    diagnostics.fatal(&format!("{report}: {reason}"));
                    return Err(Error::Failed(format!("{name} {status}: {reason}")));
                }
                StatusPhase::InProgress | StatusPhase::Unknown => {
                    diagnostics.debug(&report);
                    waiter.pause();
                }
            }
            last = status.to_string();
        }
    }

    /// Explain a rollback from the most recent failed event.
    fn rollback_failure(&self, status: &StackStatus) -> Error {
        let events = match self.read(|backend| {
            backend.list_stack_events(&self.name, ROLLBACK_EVENT_LIMIT)
        }) {
            Ok(events) => events,
            Err(e) => return e,
        };

        let reason = events
            .iter()
            .find(|e| e.is_failure())
            .and_then(|e| e.resource_status_reason.clone())
            .or_else(|| {
                self.description
                    .as_ref()
                    .and_then(|d| d.stack_status_reason.clone())
            })
            .unwrap_or_else(|| "unknown".to_string());

        if is_stack_policy_denial(&reason) {
            return Error::StackPolicy(reason);
        }
        self.diagnostics()
            .fatal(&format!("{} Status => {status}: {reason}", self.name));
        Error::Failed(format!("Failure Reason: {reason}"))
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("region", &self.region.name())
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("capabilities", &self.capabilities)
            .field("description", &self.description)
            .field("change_set", &self.change_set)
            .finish_non_exhaustive()
    }
}
