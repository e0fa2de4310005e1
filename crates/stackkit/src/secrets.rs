//! Secret retrieval for `Sneaker` parameter dependencies.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

/// What to fetch from the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRequest {
    /// KMS master key used to decrypt the secret
    pub master_key: String,
    /// Storage path (bucket and prefix) holding the secrets
    pub path: String,
    /// Name of the secret
    pub name: String,
}

/// Source of raw secret bytes.
///
/// Implementations must not retry internally: a retry re-runs an external
/// secret fetch.
pub trait SecretStore: Send + Sync {
    fn fetch(&self, request: &SecretRequest) -> Result<Vec<u8>>;
}

/// Runs `sneaker download <name> -`.
///
/// The key and path are passed as `SNEAKER_MASTER_KEY` and `SNEAKER_S3_PATH`
/// on the child process only.
#[derive(Debug, Clone)]
pub struct SneakerCli {
    program: PathBuf,
}

impl Default for SneakerCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("sneaker"),
        }
    }
}

impl SneakerCli {
    /// Use `sneaker` from `PATH`, resolved at fetch time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SecretStore for SneakerCli {
    fn fetch(&self, request: &SecretRequest) -> Result<Vec<u8>> {
        let program = which::which(&self.program).map_err(|e| {
            Error::Resolution(format!("{} not found: {e}", self.program.display()))
        })?;

        let output = Command::new(program)
            .args(["download", &request.name, "-"])
            .env("SNEAKER_MASTER_KEY", &request.master_key)
            .env("SNEAKER_S3_PATH", &request.path)
            .output()
            .map_err(|e| Error::Resolution(format!("failed to execute sneaker: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Resolution(format!(
                "sneaker download {} failed: {}",
                request.name,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Resolution(format!(
                "sneaker download {} returned no data",
                request.name
            )));
        }

        Ok(output.stdout)
    }
}

/// In-memory secret store that counts fetches (useful for testing).
#[derive(Debug, Clone, Default)]
pub struct MockSecretStore {
    secrets: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    fetched: Arc<Mutex<Vec<SecretRequest>>>,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret under a name.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), value.into()));
    }

    /// Every request made so far.
    pub fn requests(&self) -> Vec<SecretRequest> {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SecretStore for MockSecretStore {
    fn fetch(&self, request: &SecretRequest) -> Result<Vec<u8>> {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(name, _)| *name == request.name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Error::Resolution(format!("secret {} not found", request.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> SecretRequest {
        SecretRequest {
            master_key: "alias/deploy".to_string(),
            path: "bucket/secrets".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_mock_store_records_requests() {
        let store = MockSecretStore::new();
        store.insert("db", "hunter2");

        assert_eq!(store.fetch(&request("db")).unwrap(), b"hunter2");
        assert!(store.fetch(&request("missing")).is_err());
        assert_eq!(store.requests().len(), 2);
    }

    #[test]
    fn test_sneaker_missing_program() {
        let store = SneakerCli::with_program("/nonexistent/sneaker-binary");
        let err = store.fetch(&request("db")).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_sneaker_passes_scoped_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sneaker");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '%s|%s|%s' \"$SNEAKER_MASTER_KEY\" \"$SNEAKER_S3_PATH\" \"$2\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let store = SneakerCli::with_program(&script);
        let bytes = store.fetch(&request("db")).unwrap();
        assert_eq!(bytes, b"alias/deploy|bucket/secrets|db");
    }

    #[cfg(unix)]
    #[test]
    fn test_sneaker_failure_not_swallowed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sneaker");
        std::fs::write(&script, "#!/bin/sh\necho 'access denied' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = SneakerCli::with_program(&script)
            .fetch(&request("db"))
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }
}
