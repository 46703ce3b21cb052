// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;

use ab_core::error::{OrchestratorError, RepositoryOperation, Result};
use ab_core::models::{ArtifactFilter, BumpConfig, PullRequest, ResolvedArtifact};
use ab_core::services::config_loader::{validate, RawConfig};
use ab_core::services::repository::RepositoryClient;
use ab_core::services::resolver::ArtifactResolver;

/// Validated config targeting `vars.env` with the given keys.
pub fn make_config(keys: &str) -> BumpConfig {
    let raw: RawConfig = [
        ("TYPE", "ubuntu"),
        ("FILE", "vars.env"),
        ("KEYS", keys),
        ("REPOSITORY", "acme/infra"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Some(v.to_string())))
    .collect();
    validate(&raw).unwrap()
}

pub struct FakeResolver {
    outcome: std::result::Result<String, String>,
    barrier: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub fn resolving(id: &str) -> Self {
        Self {
            outcome: Ok(id.to_string()),
            barrier: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            barrier: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Block inside `latest` until every barrier party arrives.
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }
}

#[async_trait]
impl ArtifactResolver for FakeResolver {
    async fn latest(&self, _filter: &ArtifactFilter) -> Result<ResolvedArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        match &self.outcome {
            Ok(id) => Ok(ResolvedArtifact::new(id.clone())),
            Err(reason) => Err(OrchestratorError::Resolution(reason.clone())),
        }
    }
}

/// In-memory stand-in for a remote: "cloning" writes seed files into a
/// scratch directory.
pub struct FakeRepository {
    root: tempfile::TempDir,
    seed_files: Vec<(String, String)>,
    fail_on: Option<RepositoryOperation>,
    barrier: Option<Arc<Barrier>>,
    local_path: Option<PathBuf>,
    branch: Option<String>,
    pub clones: AtomicUsize,
    pub pushes: Mutex<Vec<String>>,
    pub pull_requests: Mutex<Vec<(String, String)>>,
}

impl FakeRepository {
    pub fn with_file(name: &str, content: &str) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            seed_files: vec![(name.to_string(), content.to_string())],
            fail_on: None,
            barrier: None,
            local_path: None,
            branch: None,
            clones: AtomicUsize::new(0),
            pushes: Mutex::new(Vec::new()),
            pull_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, operation: RepositoryOperation) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn pull_request_count(&self) -> usize {
        self.pull_requests.lock().unwrap().len()
    }

    pub fn read(&self, name: &str) -> String {
        let path = self.local_path.as_ref().expect("not cloned").join(name);
        std::fs::read_to_string(path).unwrap()
    }

    /// Whether any seeded file differs from what was cloned, as `git commit` sees it.
    fn has_changes(&self) -> bool {
        let Some(root) = &self.local_path else {
            return false;
        };
        self.seed_files.iter().any(|(name, content)| {
            std::fs::read_to_string(root.join(name)).map_or(true, |now| now != *content)
        })
    }

    fn check(&self, operation: RepositoryOperation) -> Result<()> {
        if self.fail_on == Some(operation) {
            return Err(OrchestratorError::repository(
                operation,
                format!("simulated {operation} failure"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn clone_remote(&mut self) -> Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        self.check(RepositoryOperation::Clone)?;
        let path = self.root.path().join("infra");
        std::fs::create_dir_all(&path)?;
        for (name, content) in &self.seed_files {
            std::fs::write(path.join(name), content)?;
        }
        self.local_path = Some(path);
        Ok(())
    }

    async fn checkout(&mut self, branch: &str) -> Result<()> {
        self.check(RepositoryOperation::Checkout)?;
        self.branch = Some(branch.to_string());
        Ok(())
    }

    async fn push(&self, message: &str) -> Result<()> {
        self.check(RepositoryOperation::Push)?;
        if !self.has_changes() {
            return Err(OrchestratorError::repository(
                RepositoryOperation::Push,
                "nothing to commit, working tree clean",
            ));
        }
        self.pushes.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn create_pull_request(&self, title: &str, body: &str) -> Result<PullRequest> {
        self.pull_requests
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        self.check(RepositoryOperation::PullRequest)?;
        Ok(PullRequest {
            number: 7,
            url: "https://github.com/acme/infra/pull/7".into(),
        })
    }

    fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    fn branch_name(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn base_branch(&self) -> Option<&str> {
        self.local_path.as_ref().map(|_| "main")
    }
}
