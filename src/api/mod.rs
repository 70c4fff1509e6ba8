//! Server endpoints the importer talks to.

mod client;
mod types;

pub use client::{parse_commit_response, parse_project_response, ServerClient};
pub use types::{
    ChunkReceipt, ChunkUpload, CommitReceipt, CommitRequest, InitResponse, NewProject, Page,
    Project, ProjectQuery,
};

use crate::error::Result;
use async_trait::async_trait;

/// The three-step external import protocol: init, chunked upload, commit.
#[async_trait]
pub trait ImportApi: Send + Sync + 'static {
    /// Opens an upload session and returns its token.
    async fn init(&self) -> Result<String>;

    async fn upload_chunk(&self, token: &str, chunk: ChunkUpload) -> Result<ChunkReceipt>;

    /// Turns the uploaded assets into a task.
    async fn commit(&self, token: &str, name: &str) -> Result<CommitReceipt>;
}

/// Project collaborators used by the dashboard.
#[async_trait]
pub trait ProjectsApi: Send + Sync {
    async fn create_project(&self, project: &NewProject) -> Result<Project>;

    async fn list_projects(&self, query: &ProjectQuery) -> Result<Page<Project>>;
}
