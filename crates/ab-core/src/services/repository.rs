use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{OrchestratorError, RepositoryOperation, Result};
use crate::models::{BumpConfig, Credentials, PullRequest};

use super::git;
use super::github::{GitHubClient, RepoSlug};

/// Source-control operations the orchestrator drives, in call order.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Clone the remote into a fresh working copy.
    async fn clone_remote(&mut self) -> Result<()>;

    /// Check out `branch`, creating it when neither local nor remote has it.
    async fn checkout(&mut self, branch: &str) -> Result<()>;

    /// Commit every change in the working copy and push the branch.
    async fn push(&self, message: &str) -> Result<()>;

    async fn create_pull_request(&self, title: &str, body: &str) -> Result<PullRequest>;

    fn local_path(&self) -> Option<&Path>;

    fn branch_name(&self) -> Option<&str>;

    /// Branch that was checked out right after cloning.
    fn base_branch(&self) -> Option<&str>;
}

/// [`RepositoryClient`] over the git CLI and the GitHub REST API.
#[derive(Debug)]
pub struct GitRepository {
    slug: RepoSlug,
    credentials: Option<Credentials>,
    workspace_dir: PathBuf,
    github: GitHubClient,
    local_path: Option<PathBuf>,
    branch: Option<String>,
    base_branch: Option<String>,
}

impl GitRepository {
    pub fn for_config(config: &BumpConfig) -> Result<Self> {
        let slug = RepoSlug::parse(&config.repository)?;
        let github = GitHubClient::new(&config.endpoints.github_api_url, config.credentials.clone())?;
        Ok(Self {
            slug,
            credentials: config.credentials.clone(),
            workspace_dir: config.workspace_dir.clone(),
            github,
            local_path: None,
            branch: None,
            base_branch: None,
        })
    }

    fn require_clone(&self, operation: RepositoryOperation) -> Result<&Path> {
        self.local_path.as_deref().ok_or_else(|| {
            OrchestratorError::repository(operation, "repository has not been cloned")
        })
    }

    fn require_branch(&self, operation: RepositoryOperation) -> Result<&str> {
        self.branch.as_deref().ok_or_else(|| {
            OrchestratorError::repository(operation, "no branch has been checked out")
        })
    }
}

#[async_trait]
impl RepositoryClient for GitRepository {
    async fn clone_remote(&mut self) -> Result<()> {
        let target = self.workspace_dir.join(&self.slug.name);
        let io_error = |e: std::io::Error| {
            OrchestratorError::repository(
                RepositoryOperation::Clone,
                format!("preparing {}: {e}", target.display()),
            )
        };
        if tokio::fs::try_exists(&target).await.map_err(io_error)? {
            tracing::warn!(path = %target.display(), "removing stale working copy");
            tokio::fs::remove_dir_all(&target).await.map_err(io_error)?;
        }
        tokio::fs::create_dir_all(&self.workspace_dir)
            .await
            .map_err(io_error)?;

        tracing::info!(repository = %self.slug, path = %target.display(), "cloning");
        let url = self.slug.clone_url(self.credentials.as_ref());
        git::clone_repo(&url, &target).await?;

        self.base_branch = Some(git::get_current_branch(&target).await?);
        self.local_path = Some(target);
        Ok(())
    }

    async fn checkout(&mut self, branch: &str) -> Result<()> {
        let path = self.require_clone(RepositoryOperation::Checkout)?;
        let exists = git::branch_exists(path, branch).await?;
        tracing::info!(branch, create = !exists, "checking out branch");
        git::checkout(path, branch, !exists).await?;
        self.branch = Some(branch.to_string());
        Ok(())
    }

    async fn push(&self, message: &str) -> Result<()> {
        let path = self.require_clone(RepositoryOperation::Push)?;
        let branch = self.require_branch(RepositoryOperation::Push)?;
        git::commit_all(path, message).await?;
        git::push(path, branch).await?;
        tracing::info!(branch, "pushed branch");
        Ok(())
    }

    async fn create_pull_request(&self, title: &str, body: &str) -> Result<PullRequest> {
        let head = self.require_branch(RepositoryOperation::PullRequest)?;
        let base = self.base_branch.as_deref().ok_or_else(|| {
            OrchestratorError::repository(
                RepositoryOperation::PullRequest,
                "base branch is unknown; repository has not been cloned",
            )
        })?;
        self.github
            .create_pull_request(&self.slug, head, base, title, body)
            .await
    }

    fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    fn branch_name(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn base_branch(&self) -> Option<&str> {
        self.base_branch.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_loader::{validate, RawConfig};

    fn config(workspace: &Path) -> BumpConfig {
        let raw: RawConfig = [
            ("TYPE", "ubuntu"),
            ("FILE", "vars.env"),
            ("KEYS", "IMAGE_ID"),
            ("REPOSITORY", "acme/infra"),
            ("WORKSPACE_DIR", workspace.to_str().unwrap()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect();
        validate(&raw).unwrap()
    }

    #[tokio::test]
    async fn operations_before_clone_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = GitRepository::for_config(&config(dir.path())).unwrap();

        assert!(repo.local_path().is_none());
        assert!(matches!(
            repo.checkout("update/ubuntu").await,
            Err(OrchestratorError::Repository {
                operation: RepositoryOperation::Checkout,
                ..
            })
        ));
        assert!(matches!(
            repo.push("update ubuntu").await,
            Err(OrchestratorError::Repository {
                operation: RepositoryOperation::Push,
                ..
            })
        ));
        assert!(matches!(
            repo.create_pull_request("t", "b").await,
            Err(OrchestratorError::Repository {
                operation: RepositoryOperation::PullRequest,
                ..
            })
        ));
    }

    #[test]
    fn malformed_repository_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        for repository in ["not-a-repo", "acme/..", "acme/."] {
            let mut cfg = config(dir.path());
            cfg.repository = repository.into();
            assert!(
                matches!(GitRepository::for_config(&cfg), Err(OrchestratorError::Config(_))),
                "{repository}"
            );
        }
    }

    #[tokio::test]
    async fn stale_working_copy_is_removed_before_clone() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("infra");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover"), "x").unwrap();

        let mut cfg = config(dir.path());
        cfg.repository = "file://localhost/acme/infra".into();
        let mut repo = GitRepository::for_config(&cfg).unwrap();

        // Nothing to clone from, but the stale copy goes first.
        assert!(matches!(
            repo.clone_remote().await,
            Err(OrchestratorError::Repository {
                operation: RepositoryOperation::Clone,
                ..
            })
        ));
        assert!(!stale.join("leftover").exists());
        assert!(dir.path().exists());
    }
}
