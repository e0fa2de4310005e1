//! # stackkit
//!
//! Pure Rust library for managing CloudFormation stack lifecycles.
//!
//! This crate provides functionality for:
//! - Creating stacks directly and updating them through change sets
//! - Resolving parameters from literals, other stacks' outputs, or sneaker secrets
//! - Waiting for a stack to settle, with rollback diagnosis from stack events
//! - Vetoing change sets that remove or replace resources
//!
//! ## Example
//!
//! ```no_run
//! use stackkit::{CapabilitySet, JsonFileTemplate, ParameterSet, ParameterValue, Region, UpdateOptions};
//! use std::sync::Arc;
//!
//! let region = Arc::new(Region::aws("us-east-1").expect("aws CLI not available"));
//!
//! let mut parameters = ParameterSet::new();
//! parameters.insert("Env", ParameterValue::literal("prod"));
//!
//! let mut stack = region
//!     .stack("web")
//!     .with_template(JsonFileTemplate::new("templates/web.json"))
//!     .with_parameters(parameters)
//!     .with_capabilities(CapabilitySet::new(["CAPABILITY_IAM"]));
//!
//! if stack.exists().unwrap() {
//!     match stack.update(UpdateOptions::default()) {
//!         Err(e) if e.is_up_to_date() => println!("Stack is up to date"),
//!         other => other.unwrap(),
//!     }
//! } else {
//!     stack.create(true).unwrap();
//! }
//! ```
//!
//! ## Parameter dependencies
//!
//! A dependency is a mapping whose `Type` selects a resolver:
//!
//! | Type                    | Keys                   | Value                          |
//! |-------------------------|------------------------|--------------------------------|
//! | `StackOutput` (default) | `Stack`, `Output`      | output of another stack        |
//! | `Sneaker`               | `Key`, `Path`, `Name`  | `sneaker download <Name> -`    |
//!
//! Each dependency is resolved at most once per [`Parameter`].

#![warn(clippy::all)]

pub mod backend;
pub mod capabilities;
pub mod change_set;
pub mod diagnostics;
pub mod error;
pub mod parameter;
pub mod region;
pub mod resolver;
pub mod retry;
pub mod secrets;
pub mod stack;
pub mod template;
pub mod types;
pub mod wait;

pub use capabilities::{CapabilityDiff, CapabilitySet};
pub use change_set::ChangeSet;
pub use diagnostics::{Diagnostics, Level};
pub use error::{Error, ErrorCategory, Result};
pub use parameter::{Parameter, ParameterSet, ParameterValue};
pub use region::Region;
pub use resolver::{DependencySpec, Resolver};
pub use retry::RetryConfig;
pub use stack::{Stack, UpdateOptions};
pub use template::{JsonFileTemplate, StaticTemplate, TemplateSource};
pub use types::{Change, StackDescription, StackStatus};
pub use wait::{CancelToken, WaitOptions};
