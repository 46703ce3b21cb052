pub mod config_loader;
pub mod file_rewriter;
pub mod git;
pub mod github;
pub mod orchestrator;
pub mod repository;
pub mod resolver;
pub mod ubuntu;
