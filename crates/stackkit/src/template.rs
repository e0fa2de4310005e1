//! Local template sources.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Producer of the local template document.
///
/// `render` is called every time the document is needed; implementations
/// must not assume the result is cached.
pub trait TemplateSource: Send + Sync {
    fn render(&self) -> Result<Value>;
}

/// A template held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTemplate(pub Value);

impl Default for StaticTemplate {
    fn default() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }
}

impl TemplateSource for StaticTemplate {
    fn render(&self) -> Result<Value> {
        Ok(self.0.clone())
    }
}

/// A JSON template file, re-read on every render.
#[derive(Debug, Clone)]
pub struct JsonFileTemplate {
    path: PathBuf,
}

impl JsonFileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateSource for JsonFileTemplate {
    fn render(&self) -> Result<Value> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", self.path.display()),
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Names of template parameters that have no `Default`.
pub fn required_parameters(template: &Value) -> Vec<String> {
    template
        .get("Parameters")
        .and_then(Value::as_object)
        .map(|params| {
            params
                .iter()
                .filter(|(_, decl)| decl.get("Default").is_none())
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default()
}
