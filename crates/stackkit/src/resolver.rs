//! Resolvers turn a parameter dependency into a literal value.
//!
//! A dependency is a mapping such as `{ Stack = "network", Output = "VpcId" }`.
//! Its `Type` key picks the resolver; without one it is `StackOutput`.

use crate::error::{Error, Result};
use crate::region::Region;
use crate::secrets::SecretRequest;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A dependency specification: resolver type plus its arguments.
pub type DependencySpec = BTreeMap<String, String>;

/// Known resolver types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// Output value of another stack (`Stack`, `Output`)
    StackOutput,
    /// Secret downloaded with sneaker (`Key`, `Path`, `Name`)
    Sneaker,
}

impl Resolver {
    /// Select the resolver named by the dependency's `Type`.
    pub fn for_spec(spec: &DependencySpec) -> Result<Self> {
        match spec.get("Type").map(String::as_str) {
            None | Some("StackOutput") => Ok(Resolver::StackOutput),
            Some("Sneaker") => Ok(Resolver::Sneaker),
            Some(other) => Err(Error::UnknownResolver(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resolver::StackOutput => "StackOutput",
            Resolver::Sneaker => "Sneaker",
        }
    }

    /// Produce the literal value for `spec`.
    pub fn resolve(&self, spec: &DependencySpec, region: &Arc<Region>) -> Result<String> {
        match self {
            Resolver::StackOutput => resolve_stack_output(spec, region),
            Resolver::Sneaker => resolve_sneaker(spec, region),
        }
    }
}

fn field<'a>(spec: &'a DependencySpec, resolver: Resolver, key: &str) -> Result<&'a str> {
    spec.get(key).map(String::as_str).ok_or_else(|| {
        Error::Resolution(format!("{} dependency requires '{key}'", resolver.name()))
    })
}

fn resolve_stack_output(spec: &DependencySpec, region: &Arc<Region>) -> Result<String> {
    let stack_name = field(spec, Resolver::StackOutput, "Stack")?;
    let output = field(spec, Resolver::StackOutput, "Output")?;

    let mut stack = region.stack(stack_name);
    let outputs = stack.outputs()?;
    outputs.get(output).cloned().ok_or_else(|| {
        Error::Resolution(format!(
            "output {output} of stack {stack_name} is not available"
        ))
    })
}

fn resolve_sneaker(spec: &DependencySpec, region: &Arc<Region>) -> Result<String> {
    let request = SecretRequest {
        master_key: field(spec, Resolver::Sneaker, "Key")?.to_string(),
        path: field(spec, Resolver::Sneaker, "Path")?.to_string(),
        name: field(spec, Resolver::Sneaker, "Name")?.to_string(),
    };

    let bytes = region.secrets().fetch(&request)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::Resolution(format!("secret {} is not valid UTF-8", request.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::diagnostics::NoDiagnostics;
    use crate::secrets::MockSecretStore;
    use crate::types::StackDescription;

    fn spec(pairs: &[(&str, &str)]) -> DependencySpec {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn region(backend: &MockBackend, secrets: &MockSecretStore) -> Arc<Region> {
        Arc::new(
            Region::new("us-east-1", backend.clone())
                .with_secrets(secrets.clone())
                .with_diagnostics(NoDiagnostics),
        )
    }

    #[test]
    fn test_dispatch_defaults_to_stack_output() {
        let s = spec(&[("Stack", "network"), ("Output", "VpcId")]);
        assert_eq!(Resolver::for_spec(&s).unwrap(), Resolver::StackOutput);

        let s = spec(&[("Type", "Sneaker")]);
        assert_eq!(Resolver::for_spec(&s).unwrap(), Resolver::Sneaker);
    }

    #[test]
    fn test_dispatch_rejects_unknown_type() {
        let err = Resolver::for_spec(&spec(&[("Type", "Vault")])).unwrap_err();
        assert!(matches!(err, Error::UnknownResolver(ref t) if t == "Vault"));
    }

    #[test]
    fn test_stack_output_resolves() {
        let backend = MockBackend::new();
        backend.set_stack(
            "network",
            vec![StackDescription::new("network", "CREATE_COMPLETE").with_output("VpcId", "vpc-123")],
        );
        let region = region(&backend, &MockSecretStore::new());

        let s = spec(&[("Stack", "network"), ("Output", "VpcId")]);
        assert_eq!(Resolver::StackOutput.resolve(&s, &region).unwrap(), "vpc-123");
    }

    #[test]
    fn test_stack_output_requires_complete_stack() {
        let backend = MockBackend::new();
        backend.set_stack(
            "network",
            vec![StackDescription::new("network", "UPDATE_IN_PROGRESS").with_output("VpcId", "vpc-123")],
        );
        let region = region(&backend, &MockSecretStore::new());

        let s = spec(&[("Stack", "network"), ("Output", "VpcId")]);
        let err = Resolver::StackOutput.resolve(&s, &region).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn test_stack_output_missing_key() {
        let backend = MockBackend::new();
        backend.set_stack(
            "network",
            vec![StackDescription::new("network", "CREATE_COMPLETE").with_output("VpcId", "vpc-123")],
        );
        let region = region(&backend, &MockSecretStore::new());

        let s = spec(&[("Stack", "network"), ("Output", "SubnetId")]);
        assert!(Resolver::StackOutput.resolve(&s, &region).is_err());

        let s = spec(&[("Stack", "network")]);
        let err = Resolver::StackOutput.resolve(&s, &region).unwrap_err();
        assert!(err.to_string().contains("'Output'"));
    }

    #[test]
    fn test_sneaker_resolves_via_store() {
        let secrets = MockSecretStore::new();
        secrets.insert("db", "hunter2");
        let region = region(&MockBackend::new(), &secrets);

        let s = spec(&[
            ("Type", "Sneaker"),
            ("Key", "alias/deploy"),
            ("Path", "bucket/secrets"),
            ("Name", "db"),
        ]);
        assert_eq!(Resolver::Sneaker.resolve(&s, &region).unwrap(), "hunter2");
        assert_eq!(
            secrets.requests(),
            vec![SecretRequest {
                master_key: "alias/deploy".to_string(),
                path: "bucket/secrets".to_string(),
                name: "db".to_string(),
            }]
        );
    }

    #[test]
    fn test_sneaker_requires_all_fields() {
        let secrets = MockSecretStore::new();
        let region = region(&MockBackend::new(), &secrets);

        let s = spec(&[("Type", "Sneaker"), ("Key", "alias/deploy"), ("Name", "db")]);
        let err = Resolver::Sneaker.resolve(&s, &region).unwrap_err();
        assert!(err.to_string().contains("'Path'"));
        assert!(secrets.requests().is_empty());
    }
}
