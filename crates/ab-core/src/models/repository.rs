use std::path::PathBuf;

use serde::Deserialize;

use super::artifact::ResolvedArtifact;

/// Working copy state after a successful clone and checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub local_path: PathBuf,
    pub branch_name: String,
    /// Branch checked out right after the clone; pull requests target it.
    pub base_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(rename = "html_url")]
    pub url: String,
}

/// Summary of a run that ended with an opened pull request.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub artifact: ResolvedArtifact,
    pub branch: String,
    pub file: PathBuf,
    pub changed_lines: usize,
    pub pull_request: PullRequest,
}
