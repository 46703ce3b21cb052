use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, RepositoryOperation, Result};
use crate::models::{Credentials, PullRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("artifact-bump/", env!("CARGO_PKG_VERSION"));

/// `owner/name` of a GitHub repository plus the URL it is cloned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
    source: String,
}

impl RepoSlug {
    /// Accepts `owner/repo`, `https://host/owner/repo(.git)` or
    /// `git@host:owner/repo(.git)`.
    pub fn parse(repository: &str) -> Result<Self> {
        let repository = repository.trim();
        let (path, source) = if let Some((_, rest)) = repository.split_once("://") {
            let path = rest.split_once('/').map(|(_, p)| p).unwrap_or("");
            (path, repository.to_string())
        } else if let Some((_, path)) = repository
            .strip_prefix("git@")
            .and_then(|r| r.split_once(':'))
        {
            (path, repository.to_string())
        } else {
            (
                repository,
                format!("https://github.com/{}.git", repository.trim_end_matches(".git")),
            )
        };

        let path = path.trim_end_matches('/').trim_end_matches(".git");
        match path.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if is_path_segment(owner) && is_path_segment(name) => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
                source,
            }),
            _ => Err(OrchestratorError::Config(format!(
                "REPOSITORY must look like owner/name, got '{repository}'"
            ))),
        }
    }

    /// Clone URL, with credentials embedded for https remotes.
    pub fn clone_url(&self, credentials: Option<&Credentials>) -> String {
        match (credentials, self.source.strip_prefix("https://")) {
            (Some(c), Some(rest)) => {
                let rest = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
                format!(
                    "https://{}:{}@{rest}",
                    encode_userinfo(&c.username),
                    encode_userinfo(&c.password)
                )
            }
            _ => self.source.clone(),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// `name` becomes a directory under the workspace, so it must be a single
/// plain segment.
fn is_path_segment(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['\\', ':'])
}

fn encode_userinfo(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Minimal GitHub REST client: only what opening a pull request needs.
#[derive(Clone)]
pub struct GitHubClient {
    api_url: String,
    credentials: Option<Credentials>,
    client: reqwest::Client,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl GitHubClient {
    pub fn new(api_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                OrchestratorError::repository(
                    RepositoryOperation::PullRequest,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    pub async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, repo.owner, repo.name);
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&NewPullRequest {
                title,
                head,
                base,
                body,
            });
        if let Some(c) = &self.credentials {
            request = request.basic_auth(&c.username, Some(&c.password));
        }

        let response = request.send().await.map_err(|e| pr_error(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| pr_error(format!("reading response: {e}")))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ApiError>(&text) {
                Ok(api) => {
                    let extra: Vec<String> =
                        api.errors.into_iter().filter_map(|e| e.message).collect();
                    if extra.is_empty() {
                        api.message
                    } else {
                        format!("{} ({})", api.message, extra.join("; "))
                    }
                }
                Err(_) => text.trim().to_string(),
            };
            return Err(pr_error(format!("GitHub returned HTTP {status}: {detail}")));
        }

        serde_json::from_str(&text).map_err(|e| pr_error(format!("unexpected response: {e}")))
    }
}

fn pr_error(message: String) -> OrchestratorError {
    OrchestratorError::repository(RepositoryOperation::PullRequest, message)
}
