use anyhow::{Context, Result, bail};
use serde::Deserialize;
use stackkit::{
    CancelToken, CapabilitySet, JsonFileTemplate, ParameterSet, ParameterValue, Region,
    RetryConfig, Stack, WaitOptions,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "stacker.toml";

/// Get the user config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stacker"))
}

/// Locate the configuration file.
///
/// An explicit path wins; otherwise `stacker.toml` in the working directory,
/// then the user config directory.
pub fn find_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand_path(&path.to_string_lossy()));
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = config_dir() {
        let user = dir.join(CONFIG_FILE);
        if user.exists() {
            return Ok(user);
        }
    }

    bail!("No {CONFIG_FILE} found in the current directory or the user config directory")
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub region: Option<String>,
    /// Named aws CLI profile
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub stacks: BTreeMap<String, StackConfig>,
    /// Directory relative template paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitConfig {
    pub grace_secs: u64,
    pub interval_secs: u64,
    pub timeout_secs: Option<u64>,
    /// Extra attempts for status reads while waiting
    pub read_retries: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            grace_secs: 2,
            interval_secs: 5,
            timeout_secs: None,
            read_retries: 0,
        }
    }
}

impl WaitConfig {
    /// Wait options, with `timeout` (seconds) overriding the configured one.
    pub fn options(&self, timeout: Option<u64>, cancel: CancelToken) -> WaitOptions {
        let mut options = WaitOptions::default()
            .with_intervals(
                Duration::from_secs(self.grace_secs),
                Duration::from_secs(self.interval_secs),
            )
            .with_cancel(cancel);

        if let Some(secs) = timeout.or(self.timeout_secs) {
            options = options.with_deadline(Duration::from_secs(secs));
        }
        if self.read_retries > 0 {
            options = options.with_read_retry(RetryConfig {
                max_attempts: self.read_retries.saturating_add(1),
                ..RetryConfig::default()
            });
        }
        options
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    /// JSON template path, relative to the config file
    pub template: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl Config {
    /// Load the configuration from the usual locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = find_config(explicit)?;
        Self::load_from(&path)
    }

    /// Load a specific configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let mut config =
            Self::parse(&content).with_context(|| format!("Invalid {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Region to use, `explicit` taking precedence
    pub fn region_name(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.region.clone())
            .context("No region configured. Set `region` in stacker.toml or pass --region")
    }

    pub fn stack_config(&self, name: &str) -> Result<&StackConfig> {
        self.stacks
            .get(name)
            .with_context(|| format!("Stack '{name}' is not defined in {CONFIG_FILE}"))
    }

    /// Configured stack names, sorted
    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.keys().map(String::as_str).collect()
    }

    pub fn template_path(&self, stack: &StackConfig) -> PathBuf {
        let path = expand_path(&stack.template);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    /// Build the configured stack `name` in `region`
    pub fn stack(&self, region: &Arc<Region>, name: &str, wait: WaitOptions) -> Result<Stack> {
        let stack_config = self.stack_config(name)?;
        let parameters: ParameterSet = stack_config
            .parameters
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(region
            .stack(name)
            .with_template(JsonFileTemplate::new(self.template_path(stack_config)))
            .with_parameters(parameters)
            .with_capabilities(CapabilitySet::new(stack_config.capabilities.clone()))
            .with_wait_options(wait))
    }
}
