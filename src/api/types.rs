use crate::error::{Result, UploadError};
use crate::upload::AssetKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InitResponse {
    pub uuid: String,
}

/// One chunk of one slot's file, ready to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    pub kind: AssetKind,
    pub file_name: String,
    pub index: u64,
    pub total_chunks: u64,
    pub chunk_size: u64,
    pub byte_offset: u64,
    pub total_file_size: u64,
    pub data: Vec<u8>,
}

impl ChunkUpload {
    /// Bytes of the file covered once this chunk lands.
    pub fn end_offset(&self) -> u64 {
        self.byte_offset + self.data.len() as u64
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total_chunks
    }
}

/// Per-chunk acknowledgement. Only informational.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkReceipt {
    pub uploaded: bool,
    pub done: bool,
    pub asset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommitRequest<'a> {
    pub uuid: &'a str,
    pub name: &'a str,
}

/// The task the server created from the uploaded assets.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommitReceipt {
    pub id: String,
    #[serde(default)]
    pub import_url: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(UploadError::validation("Name field is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub page: u32,
}

impl Default for ProjectQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
        }
    }
}

impl ProjectQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.max(1).to_string())];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_project_name_rejected() {
        assert_eq!(
            NewProject::new("  ").validate(),
            Err(UploadError::validation("Name field is required"))
        );
        assert!(NewProject::new("Survey 2024").validate().is_ok());
    }

    #[test]
    fn test_query_pairs() {
        assert_eq!(
            ProjectQuery::default().to_query_pairs(),
            vec![("page", "1".to_string())]
        );

        let query = ProjectQuery {
            search: Some("farm".into()),
            page: 3,
        };
        assert_eq!(
            query.to_query_pairs(),
            vec![("page", "3".to_string()), ("search", "farm".to_string())]
        );
    }

    #[test]
    fn test_page_deserializes() {
        let page: Page<Project> = serde_json::from_str(
            r#"{"count": 1, "next": null, "previous": null,
                "results": [{"id": 4, "name": "Quarry", "tags": ["lidar"]}]}"#,
        )
        .unwrap();
        assert_eq!(page.results[0].name, "Quarry");
        assert_eq!(page.results[0].tags, vec!["lidar".to_string()]);
    }

    #[test]
    fn test_chunk_offsets() {
        let chunk = ChunkUpload {
            kind: AssetKind::Dsm,
            file_name: "dsm.tif".into(),
            index: 1,
            total_chunks: 2,
            chunk_size: 4,
            byte_offset: 4,
            total_file_size: 6,
            data: vec![1, 2],
        };
        assert_eq!(chunk.end_offset(), 6);
        assert!(chunk.is_last());
    }
}
