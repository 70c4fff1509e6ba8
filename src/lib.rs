//! Chunked, resumable import of external photogrammetry assets
//! (orthophoto, elevation models, point cloud, textured model) into a
//! project, over the init → upload → commit protocol.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod upload;
pub mod utils;

pub use config::ImportConfig;
pub use error::{Result, UploadError};
