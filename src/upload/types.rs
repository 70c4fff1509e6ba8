use crate::error::{Result, UploadError};
use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Path, PathBuf};

/// The categories of asset the import endpoint accepts, one slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Orthophoto,
    Dsm,
    Dtm,
    PointCloud,
    TexturedModel,
}

impl AssetKind {
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Orthophoto,
        AssetKind::Dsm,
        AssetKind::Dtm,
        AssetKind::PointCloud,
        AssetKind::TexturedModel,
    ];

    /// Form field name the server expects for this slot.
    pub fn key(self) -> &'static str {
        match self {
            AssetKind::Orthophoto => "orthophoto",
            AssetKind::Dsm => "dsm",
            AssetKind::Dtm => "dtm",
            AssetKind::PointCloud => "pointcloud",
            AssetKind::TexturedModel => "texturedmodel",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Orthophoto => "Orthophoto",
            AssetKind::Dsm => "Surface Model",
            AssetKind::Dtm => "Terrain Model",
            AssetKind::PointCloud => "Point Cloud",
            AssetKind::TexturedModel => "Textured Model",
        }
    }

    pub fn accepted_patterns(self) -> &'static [&'static str] {
        match self {
            AssetKind::Orthophoto | AssetKind::Dsm | AssetKind::Dtm => &["*.tif"],
            AssetKind::PointCloud => &["*.laz", "*.las"],
            AssetKind::TexturedModel => &["*.glb"],
        }
    }

    pub fn accepts(self, file_name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.accepted_patterns().iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches_with(file_name, options))
                .unwrap_or(false)
        })
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A file picked for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            path: path.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::validation(format!("Invalid filename: {}", path.display())))?
            .to_string();
        let metadata = std::fs::metadata(path).map_err(|e| UploadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(UploadError::validation(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(Self::new(name, metadata.len(), path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Empty,
    Selected,
    Uploading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Initializing,
    Uploading,
    Committing,
    Succeeded,
    Failed,
}

impl SessionStatus {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionStatus::Initializing | SessionStatus::Uploading | SessionStatus::Committing
        )
    }
}

/// The task created by a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTask {
    pub id: String,
    pub name: String,
}
