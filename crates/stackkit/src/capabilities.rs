//! Capability acknowledgements (`CAPABILITY_IAM` and friends).

use crate::types::StackDescription;
use std::collections::BTreeSet;

/// Acknowledges IAM resources.
pub const CAPABILITY_IAM: &str = "CAPABILITY_IAM";
/// Acknowledges IAM resources with custom names.
pub const CAPABILITY_NAMED_IAM: &str = "CAPABILITY_NAMED_IAM";
/// Acknowledges macros and nested stacks.
pub const CAPABILITY_AUTO_EXPAND: &str = "CAPABILITY_AUTO_EXPAND";

/// Capabilities declared locally for a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    local: BTreeSet<String>,
}

/// Difference between local and granted capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDiff {
    /// Declared locally, not granted remotely
    pub added: Vec<String>,
    /// Granted remotely, no longer declared
    pub removed: Vec<String>,
}

impl CapabilityDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl CapabilitySet {
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            local: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Declared capabilities, sorted and deduplicated.
    pub fn local(&self) -> Vec<String> {
        self.local.iter().cloned().collect()
    }

    /// Capabilities the remote stack was granted.
    pub fn remote(description: &StackDescription) -> Vec<String> {
        let granted: BTreeSet<&String> = description.capabilities.iter().collect();
        granted.into_iter().cloned().collect()
    }

    pub fn diff(&self, description: &StackDescription) -> CapabilityDiff {
        let remote: BTreeSet<String> = description.capabilities.iter().cloned().collect();
        CapabilityDiff {
            added: self.local.difference(&remote).cloned().collect(),
            removed: remote.difference(&self.local).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}
