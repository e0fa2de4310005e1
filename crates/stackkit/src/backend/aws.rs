//! CloudFormation backend driving the `aws` CLI.
//!
//! Requests go in through `--cli-input-json`, responses come back as JSON on
//! stdout. Credentials and endpoint resolution are left to the CLI.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{
    ChangeSetDescription, CreateChangeSetRequest, CreateStackRequest, StackDescription,
    StackEvent,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Backend that executes `aws cloudformation` commands against one region.
pub struct AwsCliBackend {
    /// Path to the aws executable
    aws_path: PathBuf,
    region: String,
    profile: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksOutput {
    #[serde(default)]
    stacks: Vec<StackDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateChangeSetOutput {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStackEventsOutput {
    #[serde(default)]
    stack_events: Vec<StackEvent>,
}

impl AwsCliBackend {
    /// Create a backend for a region.
    ///
    /// Returns an error if the `aws` CLI is not installed.
    pub fn new(region: impl Into<String>) -> Result<Self> {
        let aws_path = which::which("aws").map_err(|e| Error::CommandFailed {
            message: format!("aws CLI not found in PATH: {e}"),
            stderr: String::new(),
        })?;
        Ok(Self {
            aws_path,
            region: region.into(),
            profile: None,
        })
    }

    /// Use a named CLI profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Run a cloudformation subcommand and return output.
    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.aws_path);
        cmd.arg("cloudformation")
            .args(args)
            .args(["--region", &self.region, "--output", "json", "--no-cli-pager"]);
        if let Some(profile) = &self.profile {
            cmd.args(["--profile", profile]);
        }
        log::trace!("aws cloudformation {}", args.join(" "));

        cmd.output().map_err(|e| Error::CommandFailed {
            message: format!("failed to execute aws: {e}"),
            stderr: String::new(),
        })
    }

    /// Run a cloudformation subcommand and check for success.
    fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(error_from_cli_output(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Backend for AwsCliBackend {
    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>> {
        match self.run_checked(&["describe-stacks", "--stack-name", name]) {
            Ok(stdout) => parse_describe_stacks(&stdout),
            Err(Error::Validation(message)) if message.contains("does not exist") => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_stack(&self, request: &CreateStackRequest) -> Result<()> {
        let input = serde_json::to_string(request)?;
        self.run_checked(&["create-stack", "--cli-input-json", &input])?;
        Ok(())
    }

    fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String> {
        let input = serde_json::to_string(request)?;
        let stdout = self.run_checked(&["create-change-set", "--cli-input-json", &input])?;
        let output: CreateChangeSetOutput = serde_json::from_str(&stdout)?;
        Ok(output.id)
    }

    fn describe_change_set(&self, stack: &str, change_set: &str) -> Result<ChangeSetDescription> {
        let stdout = self.run_checked(&[
            "describe-change-set",
            "--stack-name",
            stack,
            "--change-set-name",
            change_set,
        ])?;
        Ok(serde_json::from_str(&stdout)?)
    }

    fn execute_change_set(&self, stack: &str, change_set: &str) -> Result<()> {
        self.run_checked(&[
            "execute-change-set",
            "--stack-name",
            stack,
            "--change-set-name",
            change_set,
        ])?;
        Ok(())
    }

    fn list_stack_events(&self, name: &str, limit: usize) -> Result<Vec<StackEvent>> {
        let limit = limit.to_string();
        let stdout = self.run_checked(&[
            "describe-stack-events",
            "--stack-name",
            name,
            "--max-items",
            &limit,
        ])?;
        let output: DescribeStackEventsOutput = serde_json::from_str(&stdout)?;
        Ok(output.stack_events)
    }
}

/// Parse `describe-stacks` output, returning the first stack.
fn parse_describe_stacks(stdout: &str) -> Result<Option<StackDescription>> {
    let output: DescribeStacksOutput = serde_json::from_str(stdout)?;
    Ok(output.stacks.into_iter().next())
}

/// Create an error from aws CLI stderr.
///
/// The CLI reports service errors as
/// `An error occurred (<Code>) when calling the <Op> operation: <message>`.
pub fn error_from_cli_output(stderr: &str) -> Error {
    let stderr = stderr.trim();

    if let Some((code, message)) = parse_service_error(stderr) {
        return match code {
            "Throttling" | "ThrottlingException" | "RequestLimitExceeded" => {
                Error::Transport(message.to_string())
            }
            _ => Error::Validation(message.to_string()),
        };
    }

    let lower = stderr.to_lowercase();
    if lower.contains("could not connect to the endpoint")
        || lower.contains("read timeout")
        || lower.contains("connection was closed")
        || lower.contains("connect timeout")
    {
        return Error::Transport(stderr.to_string());
    }

    Error::CommandFailed {
        message: "aws cloudformation command failed".to_string(),
        stderr: stderr.to_string(),
    }
}

fn parse_service_error(stderr: &str) -> Option<(&str, &str)> {
    let start = stderr.find("An error occurred (")? + "An error occurred (".len();
    let rest = &stderr[start..];
    let end = rest.find(')')?;
    let code = &rest[..end];
    let after_code = &rest[end + 1..];
    let message = match after_code.find("operation") {
        Some(i) => {
            let mut tail = &after_code[i + "operation".len()..];
            // Retry annotation: "operation (reached max retries: 2): ..."
            if let Some(stripped) = tail.strip_prefix(" (") {
                tail = stripped.split_once(')').map_or(tail, |(_, t)| t);
            }
            tail.strip_prefix(':').unwrap_or(tail).trim()
        }
        None => after_code.trim(),
    };
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = error_from_cli_output(
            "\nAn error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id web does not exist\n",
        );
        assert!(matches!(err, Error::Validation(ref m) if m == "Stack with id web does not exist"));
    }

    #[test]
    fn test_throttling_is_transport() {
        let err = error_from_cli_output(
            "An error occurred (Throttling) when calling the DescribeStacks operation (reached max retries: 2): Rate exceeded",
        );
        assert!(matches!(err, Error::Transport(ref m) if m == "Rate exceeded"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_service_error_is_validation() {
        let err = error_from_cli_output(
            "An error occurred (InsufficientCapabilitiesException) when calling the CreateStack operation: Requires capabilities : [CAPABILITY_IAM]",
        );
        assert!(matches!(err, Error::Validation(ref m) if m.starts_with("Requires capabilities")));
    }

    #[test]
    fn test_connection_failure() {
        let err = error_from_cli_output(
            "Could not connect to the endpoint URL: \"https://cloudformation.us-east-1.amazonaws.com/\"",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unknown_failure() {
        let err = error_from_cli_output("Unable to locate credentials");
        assert!(matches!(err, Error::CommandFailed { ref stderr, .. } if stderr == "Unable to locate credentials"));
    }

    #[test]
    fn test_parse_describe_stacks() {
        let stdout = r#"{"Stacks": [{"StackName": "web", "StackStatus": "CREATE_COMPLETE"}]}"#;
        let desc = parse_describe_stacks(stdout).unwrap().unwrap();
        assert_eq!(desc.stack_name, "web");

        assert!(parse_describe_stacks(r#"{"Stacks": []}"#).unwrap().is_none());
    }

    #[test]
    fn test_parse_stack_events() {
        let stdout = r#"{"StackEvents": [{
            "EventId": "1",
            "StackName": "web",
            "LogicalResourceId": "Db",
            "ResourceStatus": "UPDATE_FAILED",
            "ResourceStatusReason": "Action denied by stack policy",
            "Timestamp": "2024-03-01T10:00:00.000Z"
        }]}"#;
        let output: DescribeStackEventsOutput = serde_json::from_str(stdout).unwrap();
        assert_eq!(output.stack_events.len(), 1);
        assert!(output.stack_events[0].is_failure());
    }
}
