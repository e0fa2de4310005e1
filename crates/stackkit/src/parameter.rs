//! Stack parameters and their resolution.
//!
//! A parameter value is either a literal or a dependency on some other
//! source. Dependencies resolve lazily and at most once per [`Parameter`];
//! the memo is held locked across resolution, so concurrent callers never
//! trigger a second external fetch.

use crate::error::Result;
use crate::region::Region;
use crate::resolver::{DependencySpec, Resolver};
use crate::template::required_parameters;
use crate::types::{ParameterEntry, StackDescription};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Value CloudFormation shows for `NoEcho` parameters.
const MASKED_VALUE: &str = "****";

/// Raw value of a parameter as declared locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Literal(String),
    Dependency(DependencySpec),
}

impl ParameterValue {
    pub fn literal(value: impl ToString) -> Self {
        ParameterValue::Literal(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Map(DependencySpec),
}

/// Scalars are coerced to strings; tables become dependencies.
impl<'de> Deserialize<'de> for ParameterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match RawValue::deserialize(deserializer)? {
            RawValue::Text(s) => ParameterValue::Literal(s),
            RawValue::Integer(i) => ParameterValue::literal(i),
            // `{:?}` keeps the decimal point of whole numbers (`1.0`, not `1`)
            RawValue::Float(f) => ParameterValue::Literal(format!("{f:?}")),
            RawValue::Boolean(b) => ParameterValue::literal(b),
            RawValue::Map(spec) => ParameterValue::Dependency(spec),
        })
    }
}

/// One named stack parameter.
#[derive(Debug)]
pub struct Parameter {
    name: String,
    value: ParameterValue,
    resolved: Mutex<Option<String>>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
            resolved: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self.value, ParameterValue::Dependency(_))
    }

    /// The literal value, resolving a dependency on first use.
    ///
    /// A failed resolution is not cached and may be attempted again.
    pub fn resolved(&self, region: &Arc<Region>) -> Result<String> {
        let spec = match &self.value {
            ParameterValue::Literal(value) => return Ok(value.clone()),
            ParameterValue::Dependency(spec) => spec,
        };

        let mut memo = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = memo.as_ref() {
            return Ok(value.clone());
        }

        let value = Resolver::for_spec(spec)?.resolve(spec, region)?;
        *memo = Some(value.clone());
        Ok(value)
    }

    /// Human-readable label; for dependencies, the sorted spec values joined by `.`.
    pub fn display_name(&self) -> String {
        match &self.value {
            ParameterValue::Literal(value) => value.clone(),
            ParameterValue::Dependency(spec) => {
                let mut values: Vec<&str> = spec.values().map(String::as_str).collect();
                values.sort_unstable();
                values.join(".")
            }
        }
    }
}

/// The local parameters of a stack, keyed by name.
#[derive(Debug, Default)]
pub struct ParameterSet {
    params: BTreeMap<String, Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a local value, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        let name = name.into();
        self.params.insert(name.clone(), Parameter::new(name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Required template parameters without a local value.
    ///
    /// Computed from `template` on every call.
    pub fn missing(&self, template: &serde_json::Value) -> Vec<String> {
        let mut missing: Vec<String> = required_parameters(template)
            .into_iter()
            .filter(|name| !self.params.contains_key(name))
            .collect();
        missing.sort();
        missing
    }

    /// Every local parameter resolved to its literal value.
    pub fn resolved_all(&self, region: &Arc<Region>) -> Result<BTreeMap<String, String>> {
        self.params
            .values()
            .map(|p| Ok((p.name.clone(), p.resolved(region)?)))
            .collect()
    }

    /// Change set input: literals as declared, dependencies resolved
    /// locally since CloudFormation cannot evaluate them.
    pub fn local_all(&self, region: &Arc<Region>) -> Result<Vec<ParameterEntry>> {
        self.params
            .values()
            .map(|p| {
                let value = match &p.value {
                    ParameterValue::Literal(value) => value.clone(),
                    ParameterValue::Dependency(_) => p.resolved(region)?,
                };
                Ok(ParameterEntry::new(p.name.clone(), value))
            })
            .collect()
    }

    /// Parameter values the remote stack was deployed with.
    pub fn remote(description: &StackDescription) -> BTreeMap<String, String> {
        description
            .parameters
            .iter()
            .filter_map(|p| {
                p.parameter_value
                    .as_ref()
                    .map(|v| (p.parameter_key.clone(), v.clone()))
            })
            .collect()
    }

    /// Local parameters whose value differs from the deployed one.
    ///
    /// Masked (`NoEcho`) remote values are never reported as changed.
    pub fn changed(
        &self,
        region: &Arc<Region>,
        description: &StackDescription,
    ) -> Result<Vec<String>> {
        let remote = Self::remote(description);
        let mut changed = Vec::new();
        for param in self.params.values() {
            let differs = match remote.get(&param.name) {
                Some(value) if value == MASKED_VALUE => false,
                Some(value) => *value != param.resolved(region)?,
                None => true,
            };
            if differs {
                changed.push(param.name.clone());
            }
        }
        Ok(changed)
    }
}

impl FromIterator<(String, ParameterValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::diagnostics::NoDiagnostics;
    use crate::error::Error;
    use crate::secrets::MockSecretStore;
    use serde_json::json;

    fn sneaker_spec(name: &str) -> DependencySpec {
        [
            ("Type", "Sneaker"),
            ("Key", "alias/deploy"),
            ("Path", "bucket/secrets"),
            ("Name", name),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn region_with(secrets: &MockSecretStore) -> Arc<Region> {
        Arc::new(
            Region::new("us-east-1", MockBackend::new())
                .with_secrets(secrets.clone())
                .with_diagnostics(NoDiagnostics),
        )
    }

    #[test]
    fn test_literal_resolves_verbatim() {
        let region = region_with(&MockSecretStore::new());
        let param = Parameter::new("Port", ParameterValue::literal(8080));

        assert_eq!(param.resolved(&region).unwrap(), "8080");
        assert_eq!(param.resolved(&region).unwrap(), "8080");
        assert!(!param.is_dependency());
    }

    #[test]
    fn test_dependency_resolves_once() {
        let secrets = MockSecretStore::new();
        secrets.insert("db", "hunter2");
        let region = region_with(&secrets);
        let param = Parameter::new("DbPassword", ParameterValue::Dependency(sneaker_spec("db")));

        for _ in 0..5 {
            assert_eq!(param.resolved(&region).unwrap(), "hunter2");
        }
        assert_eq!(secrets.requests().len(), 1);
    }

    #[test]
    fn test_dependency_resolves_once_across_threads() {
        let secrets = MockSecretStore::new();
        secrets.insert("db", "hunter2");
        let region = region_with(&secrets);
        let param = Parameter::new("DbPassword", ParameterValue::Dependency(sneaker_spec("db")));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| assert_eq!(param.resolved(&region).unwrap(), "hunter2"));
            }
        });
        assert_eq!(secrets.requests().len(), 1);
    }

    #[test]
    fn test_failed_resolution_not_cached() {
        let secrets = MockSecretStore::new();
        let region = region_with(&secrets);
        let param = Parameter::new("DbPassword", ParameterValue::Dependency(sneaker_spec("db")));

        assert!(param.resolved(&region).is_err());
        secrets.insert("db", "hunter2");
        assert_eq!(param.resolved(&region).unwrap(), "hunter2");
    }

    #[test]
    fn test_unknown_resolver_fails() {
        let region = region_with(&MockSecretStore::new());
        let spec = [("Type".to_string(), "Vault".to_string())].into_iter().collect();
        let param = Parameter::new("Token", ParameterValue::Dependency(spec));

        assert!(matches!(param.resolved(&region), Err(Error::UnknownResolver(_))));
    }

    #[test]
    fn test_display_name() {
        let param = Parameter::new("DbPassword", ParameterValue::Dependency(sneaker_spec("db")));
        assert_eq!(param.display_name(), "Sneaker.alias/deploy.bucket/secrets.db");

        let param = Parameter::new("Env", ParameterValue::literal("prod"));
        assert_eq!(param.display_name(), "prod");
    }

    #[test]
    fn test_missing_is_required_minus_declared() {
        let template = json!({
            "Parameters": {
                "Env": {"Type": "String"},
                "VpcId": {"Type": "String"},
                "Size": {"Type": "String", "Default": "small"}
            }
        });
        let mut params = ParameterSet::new();
        params.insert("Env", ParameterValue::literal("prod"));

        assert_eq!(params.missing(&template), vec!["VpcId"]);

        params.insert("VpcId", ParameterValue::literal("vpc-1"));
        assert!(params.missing(&template).is_empty());

        let refreshed = json!({"Parameters": {"Subnet": {"Type": "String"}}});
        assert_eq!(params.missing(&refreshed), vec!["Subnet"]);
    }

    #[test]
    fn test_resolved_all_and_local_all() {
        let secrets = MockSecretStore::new();
        secrets.insert("db", "hunter2");
        let region = region_with(&secrets);

        let params: ParameterSet = [
            ("Env".to_string(), ParameterValue::literal("prod")),
            (
                "DbPassword".to_string(),
                ParameterValue::Dependency(sneaker_spec("db")),
            ),
        ]
        .into_iter()
        .collect();

        let resolved = params.resolved_all(&region).unwrap();
        assert_eq!(resolved["Env"], "prod");
        assert_eq!(resolved["DbPassword"], "hunter2");

        let local = params.local_all(&region).unwrap();
        assert_eq!(
            local,
            vec![
                ParameterEntry::new("DbPassword", "hunter2"),
                ParameterEntry::new("Env", "prod"),
            ]
        );
        assert_eq!(secrets.requests().len(), 1);
    }

    #[test]
    fn test_changed_against_remote() {
        let region = region_with(&MockSecretStore::new());
        let params: ParameterSet = [
            ("Env".to_string(), ParameterValue::literal("prod")),
            ("Size".to_string(), ParameterValue::literal("large")),
            ("Secret".to_string(), ParameterValue::literal("x")),
            ("New".to_string(), ParameterValue::literal("1")),
        ]
        .into_iter()
        .collect();
        let description = StackDescription::new("web", "UPDATE_COMPLETE")
            .with_parameter("Env", "prod")
            .with_parameter("Size", "small")
            .with_parameter("Secret", "****");

        assert_eq!(params.changed(&region, &description).unwrap(), vec!["New", "Size"]);
    }

    #[test]
    fn test_deserialize_values() {
        #[derive(Deserialize)]
        struct Doc {
            params: BTreeMap<String, ParameterValue>,
        }

        let doc: Doc = serde_json::from_value(json!({
            "params": {
                "Env": "prod",
                "Port": 8080,
                "Debug": true,
                "Ratio": 1.0,
                "Weight": 0.25,
                "VpcId": {"Stack": "network", "Output": "VpcId"}
            }
        }))
        .unwrap();

        assert_eq!(doc.params["Env"], ParameterValue::literal("prod"));
        assert_eq!(doc.params["Port"], ParameterValue::literal("8080"));
        assert_eq!(doc.params["Debug"], ParameterValue::literal("true"));
        assert_eq!(doc.params["Ratio"], ParameterValue::literal("1.0"));
        assert_eq!(doc.params["Weight"], ParameterValue::literal("0.25"));
        assert!(matches!(doc.params["VpcId"], ParameterValue::Dependency(ref s) if s["Stack"] == "network"));
    }
}
