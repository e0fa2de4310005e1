//! Backend abstraction for the CloudFormation API.
//!
//! The [`Backend`] trait is the remote capability a [`Region`](crate::Region)
//! owns. [`aws::AwsCliBackend`] drives the `aws` CLI; [`MockBackend`] is a
//! scripted in-memory implementation for tests.
//!
//! Backends report remote rejections as [`Error::Validation`] and
//! connectivity problems as [`Error::Transport`]. Classification into domain
//! errors happens in the stack layer.

pub mod aws;

use crate::error::{Error, Result};
use crate::types::{
    ChangeSetDescription, CreateChangeSetRequest, CreateStackRequest, StackDescription,
    StackEvent,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remote stack API.
pub trait Backend: Send + Sync {
    /// Describe a stack. Returns `None` when the stack does not exist.
    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>>;

    /// Submit a direct stack creation.
    fn create_stack(&self, request: &CreateStackRequest) -> Result<()>;

    /// Submit a change set. Returns the change set id.
    fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String>;

    /// Describe a change set.
    fn describe_change_set(&self, stack: &str, change_set: &str) -> Result<ChangeSetDescription>;

    /// Execute a previously created change set.
    fn execute_change_set(&self, stack: &str, change_set: &str) -> Result<()>;

    /// List the most recent events of a stack, newest first.
    fn list_stack_events(&self, name: &str, limit: usize) -> Result<Vec<StackEvent>>;
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeStack(String),
    CreateStack(CreateStackRequest),
    CreateChangeSet(CreateChangeSetRequest),
    DescribeChangeSet { stack: String, change_set: String },
    ExecuteChangeSet { stack: String, change_set: String },
    ListStackEvents { stack: String, limit: usize },
}

impl Call {
    /// Whether the call mutates remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateStack(_) | Call::CreateChangeSet(_) | Call::ExecuteChangeSet { .. }
        )
    }
}

/// Error a mock operation should fail with.
#[derive(Debug, Clone)]
enum Failure {
    Validation(String),
    Transport(String),
}

impl Failure {
    fn to_error(&self) -> Error {
        match self {
            Failure::Validation(m) => Error::Validation(m.clone()),
            Failure::Transport(m) => Error::Transport(m.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    stacks: HashMap<String, VecDeque<StackDescription>>,
    after_create: HashMap<String, VecDeque<StackDescription>>,
    after_execute: HashMap<String, VecDeque<StackDescription>>,
    events: HashMap<String, Vec<StackEvent>>,
    change_sets: HashMap<String, VecDeque<ChangeSetDescription>>,
    describe_failures: VecDeque<Failure>,
    create_failure: Option<Failure>,
    change_set_failure: Option<Failure>,
    execute_failure: Option<Failure>,
    calls: Vec<Call>,
}

/// Scripted in-memory backend for testing.
///
/// Descriptions are queued per stack: each `describe_stack` pops the front
/// of the queue until one entry is left, which then repeats forever. Clones
/// share state, so a test can keep a handle after giving one to a region.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create an empty mock backend. Every stack is absent.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the descriptions returned for a stack, one per read.
    pub fn set_stack(&self, name: &str, descriptions: Vec<StackDescription>) {
        self.lock()
            .stacks
            .insert(name.to_string(), descriptions.into());
    }

    /// Script a stack by status strings.
    pub fn set_statuses(&self, name: &str, statuses: &[&str]) {
        self.set_stack(name, descriptions(name, statuses));
    }

    /// Statuses a stack reports once `create_stack` succeeds for it.
    pub fn statuses_after_create(&self, name: &str, statuses: &[&str]) {
        self.lock()
            .after_create
            .insert(name.to_string(), descriptions(name, statuses).into());
    }

    /// Statuses a stack reports once its change set is executed.
    pub fn statuses_after_execute(&self, name: &str, statuses: &[&str]) {
        self.lock()
            .after_execute
            .insert(name.to_string(), descriptions(name, statuses).into());
    }

    /// Set the event history of a stack, newest first.
    pub fn set_events(&self, name: &str, events: Vec<StackEvent>) {
        self.lock().events.insert(name.to_string(), events);
    }

    /// Script the change set descriptions returned for a stack.
    pub fn set_change_set(&self, stack: &str, descriptions: Vec<ChangeSetDescription>) {
        self.lock()
            .change_sets
            .insert(stack.to_string(), descriptions.into());
    }

    /// Fail the next `describe_stack` call with a transport error.
    pub fn fail_next_describe(&self, message: &str) {
        self.lock()
            .describe_failures
            .push_back(Failure::Transport(message.to_string()));
    }

    /// Fail `create_stack` with a validation error.
    pub fn fail_create(&self, message: &str) {
        self.lock().create_failure = Some(Failure::Validation(message.to_string()));
    }

    /// Fail `create_change_set` with a validation error.
    pub fn fail_change_set(&self, message: &str) {
        self.lock().change_set_failure = Some(Failure::Validation(message.to_string()));
    }

    /// Fail `execute_change_set` with a validation error.
    pub fn fail_execute(&self, message: &str) {
        self.lock().execute_failure = Some(Failure::Validation(message.to_string()));
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls that mutate remote state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Number of `describe_stack` calls for a stack.
    pub fn describe_count(&self, name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::DescribeStack(n) if n == name))
            .count()
    }
}

fn descriptions(name: &str, statuses: &[&str]) -> Vec<StackDescription> {
    statuses
        .iter()
        .map(|s| StackDescription::new(name, *s))
        .collect()
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl Backend for MockBackend {
    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>> {
        let mut state = self.lock();
        state.calls.push(Call::DescribeStack(name.to_string()));
        if let Some(failure) = state.describe_failures.pop_front() {
            return Err(failure.to_error());
        }
        Ok(state.stacks.get_mut(name).and_then(next_scripted))
    }

    fn create_stack(&self, request: &CreateStackRequest) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::CreateStack(request.clone()));
        if let Some(failure) = &state.create_failure {
            return Err(failure.to_error());
        }
        if let Some(queue) = state.after_create.remove(&request.stack_name) {
            state.stacks.insert(request.stack_name.clone(), queue);
        }
        Ok(())
    }

    fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(Call::CreateChangeSet(request.clone()));
        if let Some(failure) = &state.change_set_failure {
            return Err(failure.to_error());
        }
        Ok(format!(
            "arn:aws:cloudformation:mock:changeSet/{}",
            request.change_set_name
        ))
    }

    fn describe_change_set(&self, stack: &str, change_set: &str) -> Result<ChangeSetDescription> {
        let mut state = self.lock();
        state.calls.push(Call::DescribeChangeSet {
            stack: stack.to_string(),
            change_set: change_set.to_string(),
        });
        let description = state
            .change_sets
            .get_mut(stack)
            .and_then(next_scripted)
            .unwrap_or_else(|| ChangeSetDescription::complete(Vec::new()));
        Ok(ChangeSetDescription {
            change_set_name: Some(change_set.to_string()),
            ..description
        })
    }

    fn execute_change_set(&self, stack: &str, change_set: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::ExecuteChangeSet {
            stack: stack.to_string(),
            change_set: change_set.to_string(),
        });
        if let Some(failure) = &state.execute_failure {
            return Err(failure.to_error());
        }
        if let Some(queue) = state.after_execute.remove(stack) {
            state.stacks.insert(stack.to_string(), queue);
        }
        Ok(())
    }

    fn list_stack_events(&self, name: &str, limit: usize) -> Result<Vec<StackEvent>> {
        let mut state = self.lock();
        state.calls.push(Call::ListStackEvents {
            stack: name.to_string(),
            limit,
        });
        Ok(state
            .events
            .get(name)
            .map(|events| events.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_absent_stack() {
        let mock = MockBackend::new();
        assert!(mock.describe_stack("web").unwrap().is_none());
        assert_eq!(mock.describe_count("web"), 1);
    }

    #[test]
    fn test_mock_scripted_statuses_repeat_last() {
        let mock = MockBackend::new();
        mock.set_statuses("web", &["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"]);

        let read = |m: &MockBackend| m.describe_stack("web").unwrap().unwrap().stack_status;
        assert_eq!(read(&mock), "UPDATE_IN_PROGRESS");
        assert_eq!(read(&mock), "UPDATE_COMPLETE");
        assert_eq!(read(&mock), "UPDATE_COMPLETE");
    }

    #[test]
    fn test_mock_after_create_installs_script() {
        let mock = MockBackend::new();
        mock.statuses_after_create("web", &["CREATE_COMPLETE"]);
        assert!(mock.describe_stack("web").unwrap().is_none());

        let request = CreateStackRequest {
            stack_name: "web".to_string(),
            template_body: "{}".to_string(),
            parameters: Vec::new(),
            capabilities: Vec::new(),
        };
        mock.create_stack(&request).unwrap();

        assert!(mock.describe_stack("web").unwrap().is_some());
        assert_eq!(mock.mutations(), vec![Call::CreateStack(request)]);
    }

    #[test]
    fn test_mock_failures() {
        let mock = MockBackend::new();
        mock.fail_execute("No updates are to be performed.");
        let err = mock.execute_change_set("web", "cs").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        mock.fail_next_describe("connection reset");
        assert!(mock.describe_stack("web").unwrap_err().is_retryable());
        assert!(mock.describe_stack("web").is_ok());
    }

    #[test]
    fn test_mock_events_limit() {
        let mock = MockBackend::new();
        let events = (0..40)
            .map(|i| StackEvent::new(format!("R{i}"), "UPDATE_COMPLETE", None))
            .collect();
        mock.set_events("web", events);
        assert_eq!(mock.list_stack_events("web", 30).unwrap().len(), 30);
    }
}
