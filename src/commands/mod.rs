pub mod create;
pub mod diff;
pub mod outputs;
pub mod status;
pub mod update;

use anyhow::Result;
use std::sync::Arc;

use crate::Context;
use crate::config::Config;
use crate::ui;
use stackkit::backend::aws::AwsCliBackend;
use stackkit::{Region, Stack};

/// Loaded configuration plus the region it targets.
pub struct Session {
    pub config: Config,
    pub region: Arc<Region>,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.config.as_deref())?;
        let region_name = config.region_name(ctx.region.as_deref())?;
        log::debug!("Using region {region_name}");

        let mut backend = AwsCliBackend::new(region_name.clone())?;
        if let Some(profile) = &config.profile {
            backend = backend.with_profile(profile.clone());
        }
        let region =
            Region::new(region_name, backend).with_diagnostics(ui::UiDiagnostics::new(ctx.quiet));
        Ok(Self {
            config,
            region: Arc::new(region),
        })
    }

    /// Build a configured stack, `timeout` (seconds) overriding the configured deadline
    pub fn stack(&self, ctx: &Context, name: &str, timeout: Option<u64>) -> Result<Stack> {
        let wait = self.config.wait.options(timeout, ctx.cancel.clone());
        self.config.stack(&self.region, name, wait)
    }
}

/// Print advice for a stack error and convert it for `main`.
pub fn report(err: stackkit::Error) -> anyhow::Error {
    ui::dim(err.category().advice());
    anyhow::Error::new(err)
}
