use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::models::{ArtifactFilter, ArtifactType, BumpConfig, Credentials, Endpoints};

pub type RawConfig = HashMap<String, Option<String>>;

const DEFAULT_BRANCH_PREFIX: &str = "update";
const WORKSPACE_DIRNAME: &str = "artifact-bump";

/// Filter attributes for artifact discovery: (setting name, attribute name).
pub const FILTER_SETTINGS: &[(&str, &str)] = &[
    ("CLOUD", "cloud"),
    ("ZONE", "zone"),
    ("VERSION", "version"),
    ("ARCHITECTURE", "architecture"),
    ("INSTANCE_TYPE", "instance_type"),
    ("RELEASE", "release"),
];

/// Every setting read from the process environment.
pub const SETTINGS: &[&str] = &[
    "TYPE",
    "FILE",
    "KEYS",
    "BRANCH_NAME",
    "BRANCH_PREFIX",
    "REPOSITORY",
    "USERNAME",
    "PASSWORD",
    "CLOUD",
    "ZONE",
    "VERSION",
    "ARCHITECTURE",
    "INSTANCE_TYPE",
    "RELEASE",
    "GITHUB_API_URL",
    "UBUNTU_LOCATOR_URL",
    "WORKSPACE_DIR",
];

/// Collect known settings from the environment and validate them.
pub fn from_env() -> Result<BumpConfig> {
    let raw: RawConfig = SETTINGS
        .iter()
        .map(|name| (name.to_string(), std::env::var(name).ok()))
        .collect();
    validate(&raw)
}

/// Turn raw string settings into a typed configuration.
///
/// Blank values count as absent. Only `USERNAME` and `PASSWORD` may be
/// missing; `BRANCH_NAME` falls back to `TYPE` and `BRANCH_PREFIX` to
/// `update` before the required check runs.
pub fn validate(raw: &RawConfig) -> Result<BumpConfig> {
    let raw_type = required(raw, "TYPE")?;
    let artifact_type: ArtifactType = raw_type.parse()?;
    let file_path = relative_file(required(raw, "FILE")?)?;
    let keys = parse_keys(required(raw, "KEYS")?)?;
    let branch_name = value(raw, "BRANCH_NAME").unwrap_or(raw_type).to_string();
    let branch_prefix = value(raw, "BRANCH_PREFIX")
        .unwrap_or(DEFAULT_BRANCH_PREFIX)
        .trim_end_matches('/')
        .to_string();
    if branch_prefix.is_empty() {
        return Err(OrchestratorError::Config(
            "BRANCH_PREFIX must not be empty".into(),
        ));
    }
    let repository = required(raw, "REPOSITORY")?.to_string();

    let credentials = match (value(raw, "USERNAME"), value(raw, "PASSWORD")) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(OrchestratorError::Config(
                "USERNAME is set but PASSWORD is missing".into(),
            ))
        }
        (None, Some(_)) => {
            return Err(OrchestratorError::Config(
                "PASSWORD is set but USERNAME is missing".into(),
            ))
        }
    };

    let defaults = Endpoints::default();
    let endpoints = Endpoints {
        github_api_url: value(raw, "GITHUB_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.github_api_url),
        ubuntu_locator_url: value(raw, "UBUNTU_LOCATOR_URL")
            .map(str::to_string)
            .unwrap_or(defaults.ubuntu_locator_url),
    };

    let workspace_dir = value(raw, "WORKSPACE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(WORKSPACE_DIRNAME));

    Ok(BumpConfig {
        artifact_type,
        file_path,
        keys,
        branch_name,
        branch_prefix,
        repository,
        credentials,
        filter: filter_from_raw(raw),
        endpoints,
        workspace_dir,
    })
}

/// Build the sparse discovery filter from whichever attributes are set.
pub fn filter_from_raw(raw: &RawConfig) -> ArtifactFilter {
    let mut filter = ArtifactFilter::new();
    for (setting, attribute) in FILTER_SETTINGS {
        if let Some(v) = value(raw, setting) {
            filter.insert(attribute, v);
        }
    }
    filter
}

/// Split the comma separated key list, keeping first occurrences in order.
pub fn parse_keys(raw_keys: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    for key in raw_keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    if keys.is_empty() {
        return Err(OrchestratorError::Config(
            "KEYS must name at least one key".into(),
        ));
    }
    Ok(keys)
}

/// The target file must stay inside the working copy.
fn relative_file(file: &str) -> Result<String> {
    let path = Path::new(file);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(OrchestratorError::Config(format!(
            "FILE must be a path inside the repository, got '{file}'"
        )));
    }
    Ok(file.to_string())
}

fn value<'a>(raw: &'a RawConfig, name: &str) -> Option<&'a str> {
    raw.get(name)
        .and_then(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required<'a>(raw: &'a RawConfig, name: &str) -> Result<&'a str> {
    value(raw, name)
        .ok_or_else(|| OrchestratorError::Config(format!("{name} is required")))
}
