use std::path::PathBuf;

use crate::error::{OrchestratorError, RepositoryOperation, Result, Stage};
use crate::models::{
    ArtifactFilter, Assignments, BumpConfig, RepositoryHandle, ResolvedArtifact, RunReport,
};

use super::file_rewriter;
use super::repository::RepositoryClient;
use super::resolver::ArtifactResolver;

/// Settled results of the two concurrent preparation tasks.
#[derive(Debug)]
pub struct PreparationOutcome {
    pub artifact: Result<ResolvedArtifact>,
    pub repository: Result<RepositoryHandle>,
}

impl PreparationOutcome {
    /// Both values, or every failure folded into one composite error.
    pub fn into_result(self) -> Result<(ResolvedArtifact, RepositoryHandle)> {
        match (self.artifact, self.repository) {
            (Ok(artifact), Ok(handle)) => Ok((artifact, handle)),
            (artifact, repository) => {
                let failures: Vec<OrchestratorError> = [artifact.err(), repository.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                Err(OrchestratorError::Preparation(failures))
            }
        }
    }
}

pub async fn resolve_artifact<R: ArtifactResolver>(
    resolver: &R,
    filter: &ArtifactFilter,
) -> Result<ResolvedArtifact> {
    tracing::info!(filter = %filter, "resolving artifact");
    resolver.latest(filter).await
}

/// Clone, then check out `branch`.
pub async fn prepare_repository<C: RepositoryClient>(
    client: &mut C,
    branch: &str,
) -> Result<RepositoryHandle> {
    client.clone_remote().await?;
    client.checkout(branch).await?;

    let local_path = client.local_path().map(PathBuf::from).ok_or_else(|| {
        OrchestratorError::repository(RepositoryOperation::Clone, "no working copy after clone")
    })?;
    let base_branch = client.base_branch().unwrap_or_default().to_string();
    let branch_name = client.branch_name().unwrap_or(branch).to_string();
    Ok(RepositoryHandle {
        local_path,
        branch_name,
        base_branch,
    })
}

/// Drives one artifact bump from discovery to an opened pull request.
pub struct Orchestrator<R, C> {
    resolver: R,
    client: C,
}

impl<R: ArtifactResolver, C: RepositoryClient> Orchestrator<R, C> {
    pub fn new(resolver: R, client: C) -> Self {
        Self { resolver, client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_parts(self) -> (R, C) {
        (self.resolver, self.client)
    }

    /// Run the whole pipeline. Errors are tagged with the [`Stage`] that
    /// failed; nothing is written or pushed unless preparation succeeded.
    pub async fn run(&mut self, config: &BumpConfig) -> Result<RunReport> {
        let (artifact, handle) = self.prepare(config).await.map_err(|e| e.at(Stage::Prepare))?;
        tracing::info!(
            artifact = %artifact,
            branch = %handle.branch_name,
            "preparation finished"
        );

        let assignments = Assignments::uniform(&config.keys, &artifact.id);
        let file = handle.local_path.join(&config.file_path);
        let summary = file_rewriter::rewrite(&file, &assignments)
            .await
            .map_err(|e| e.at(Stage::Rewrite))?;
        tracing::info!(
            file = %file.display(),
            changed_lines = summary.changed_lines,
            "file updated"
        );

        let message = config.commit_message();
        self.client
            .push(&message)
            .await
            .map_err(|e| e.at(Stage::Push))?;

        let body = pull_request_body(config, &artifact, &assignments);
        let pull_request = self
            .client
            .create_pull_request(&message, &body)
            .await
            .map_err(|e| e.at(Stage::PullRequest))?;
        tracing::info!(number = pull_request.number, url = %pull_request.url, "pull request opened");

        Ok(RunReport {
            artifact,
            branch: handle.branch_name,
            file,
            changed_lines: summary.changed_lines,
            pull_request,
        })
    }

    async fn prepare(&mut self, config: &BumpConfig) -> Result<(ResolvedArtifact, RepositoryHandle)> {
        let branch = config.branch();
        let (artifact, repository) = tokio::join!(
            resolve_artifact(&self.resolver, &config.filter),
            prepare_repository(&mut self.client, &branch),
        );
        if let Err(e) = &artifact {
            tracing::warn!(error = %e, "artifact resolution failed");
        }
        if let Err(e) = &repository {
            tracing::warn!(error = %e, "repository preparation failed");
        }
        PreparationOutcome {
            artifact,
            repository,
        }
        .into_result()
    }
}

fn pull_request_body(
    config: &BumpConfig,
    artifact: &ResolvedArtifact,
    assignments: &Assignments,
) -> String {
    let mut body = format!(
        "Updates `{}` to the latest {} artifact `{}`.\n\n| Key | Value |\n| --- | --- |\n",
        config.file_path, config.artifact_type, artifact.id
    );
    for (key, value) in assignments.iter() {
        body.push_str(&format!("| `{key}` | `{value}` |\n"));
    }
    if !artifact.details.is_empty() {
        body.push('\n');
        for (name, value) in &artifact.details {
            body.push_str(&format!("- {name}: {value}\n"));
        }
    }
    body
}
