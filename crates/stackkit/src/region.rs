//! A region: one CloudFormation endpoint and the capabilities stacks share.

use crate::backend::Backend;
use crate::backend::aws::AwsCliBackend;
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::Result;
use crate::secrets::{SecretStore, SneakerCli};
use crate::stack::Stack;
use crate::wait::{Clock, SystemClock};
use std::fmt;
use std::sync::Arc;

/// Remote endpoint plus the injected capabilities of every stack in it.
///
/// Built once, then shared as `Arc<Region>`.
pub struct Region {
    name: String,
    backend: Arc<dyn Backend>,
    secrets: Arc<dyn SecretStore>,
    diagnostics: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
}

impl Region {
    /// Create a region around a backend, with sneaker secrets, `log`
    /// diagnostics and the system clock.
    pub fn new(name: impl Into<String>, backend: impl Backend + 'static) -> Self {
        Self {
            name: name.into(),
            backend: Arc::new(backend),
            secrets: Arc::new(SneakerCli::new()),
            diagnostics: Arc::new(LogDiagnostics),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a region backed by the `aws` CLI.
    pub fn aws(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let backend = AwsCliBackend::new(name.clone())?;
        Ok(Self::new(name, backend))
    }

    pub fn with_secrets(mut self, secrets: impl SecretStore + 'static) -> Self {
        self.secrets = Arc::new(secrets);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn secrets(&self) -> &dyn SecretStore {
        self.secrets.as_ref()
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// A stack in this region with an empty template and no parameters.
    pub fn stack(self: &Arc<Self>, name: impl Into<String>) -> Stack {
        Stack::new(Arc::clone(self), name)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region").field("name", &self.name).finish()
    }
}
