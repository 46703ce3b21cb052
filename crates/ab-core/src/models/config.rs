use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::artifact::ArtifactFilter;
use crate::error::OrchestratorError;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_UBUNTU_LOCATOR_URL: &str =
    "https://cloud-images.ubuntu.com/locator/releasesTable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    Ubuntu,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Ubuntu => "ubuntu",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ubuntu" => Ok(ArtifactType::Ubuntu),
            other => Err(OrchestratorError::Config(format!(
                "unsupported artifact type '{other}'"
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Remote service base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub github_api_url: String,
    pub ubuntu_locator_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            ubuntu_locator_url: DEFAULT_UBUNTU_LOCATOR_URL.to_string(),
        }
    }
}

/// Validated run configuration. Built once by `config_loader::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpConfig {
    pub artifact_type: ArtifactType,
    /// Target file, relative to the repository root.
    pub file_path: String,
    pub keys: Vec<String>,
    pub branch_name: String,
    pub branch_prefix: String,
    /// `owner/repo` or a full clone URL.
    pub repository: String,
    pub credentials: Option<Credentials>,
    pub filter: ArtifactFilter,
    pub endpoints: Endpoints,
    pub workspace_dir: PathBuf,
}

impl BumpConfig {
    /// Full branch ref, `{prefix}/{name}`.
    pub fn branch(&self) -> String {
        format!("{}/{}", self.branch_prefix, self.branch_name)
    }

    pub fn commit_message(&self) -> String {
        format!("update {}", self.artifact_type)
    }
}
