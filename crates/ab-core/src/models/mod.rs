pub mod artifact;
pub mod config;
pub mod repository;

pub use artifact::{ArtifactFilter, Assignments, ResolvedArtifact};
pub use config::{ArtifactType, BumpConfig, Credentials, Endpoints};
pub use repository::{PullRequest, RepositoryHandle, RunReport};
