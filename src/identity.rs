use crate::error::{Error, Result};
use anyhow::Context;
use std::fmt;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Stable identifier of the sampled host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineIdentity(String);

impl MachineIdentity {
    pub fn new(identity: &str) -> Result<Self> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(Error::configuration("Machine identity cannot be empty"));
        }
        Ok(Self(identity.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the identity of the current host.
pub trait IdentityProvider {
    fn machine_identity(&self) -> Result<MachineIdentity>;
}

/// Reads the identity from a file, generating and persisting
/// a random UUID the first time.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    path: PathBuf,
}

impl FileIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityProvider for FileIdentity {
    fn machine_identity(&self) -> Result<MachineIdentity> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            // Only the first line matters, like uuidgen output
            let first_line = content.lines().next().unwrap_or_default();
            return MachineIdentity::new(first_line).map_err(|_| {
                Error::configuration(format!(
                    "Identity file {} is empty",
                    self.path.display()
                ))
            });
        }

        let identity = Uuid::new_v4().to_string();
        std::fs::write(&self.path, format!("{}\n", identity))
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), %identity, "Generated a new machine identity");
        MachineIdentity::new(&identity)
    }
}

/// Fixed identity, for hosts whose identifier is managed elsewhere.
impl IdentityProvider for MachineIdentity {
    fn machine_identity(&self) -> Result<MachineIdentity> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_identity() {
        assert_eq!(MachineIdentity::new(" m1 \n").unwrap().as_str(), "m1");
        assert!(matches!(
            MachineIdentity::new("   "),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_file_identity_is_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileIdentity::new(dir.path().join("uuid"));

        let first = provider.machine_identity().unwrap();
        assert!(Uuid::parse_str(first.as_str()).is_ok());

        let second = provider.machine_identity().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_identity_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uuid");
        std::fs::write(&path, "my-host\nignored\n").unwrap();

        let identity = FileIdentity::new(&path).machine_identity().unwrap();
        assert_eq!(identity.as_str(), "my-host");
    }

    #[test]
    fn test_file_identity_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uuid");
        std::fs::write(&path, "\n").unwrap();

        assert!(matches!(
            FileIdentity::new(&path).machine_identity(),
            Err(Error::Configuration(_))
        ));
    }
}
