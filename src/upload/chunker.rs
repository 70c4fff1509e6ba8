use crate::api::ChunkUpload;
use crate::error::{Result, UploadError};
use crate::upload::types::{AssetKind, SelectedFile};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// How a file is split for upload. An empty file is still one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
}

impl ChunkPlan {
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        Self {
            file_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size).max(1)
    }

    pub fn offset(&self, index: u64) -> u64 {
        (index * self.chunk_size).min(self.file_size)
    }

    pub fn len(&self, index: u64) -> u64 {
        let start = self.offset(index);
        (start + self.chunk_size).min(self.file_size) - start
    }

    pub fn is_empty(&self) -> bool {
        self.file_size == 0
    }
}

/// Reads chunk `index` of `file` from disk.
pub async fn read_chunk(
    kind: AssetKind,
    file: &SelectedFile,
    plan: ChunkPlan,
    index: u64,
) -> Result<ChunkUpload> {
    let offset = plan.offset(index);
    let len = plan.len(index);
    let data = read_range(&file.path, offset, len).await?;

    Ok(ChunkUpload {
        kind,
        file_name: file.name.clone(),
        index,
        total_chunks: plan.total_chunks(),
        chunk_size: plan.chunk_size,
        byte_offset: offset,
        total_file_size: plan.file_size,
        data,
    })
}

async fn read_range(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    let io_err = |e: std::io::Error| UploadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut file = File::open(path).await.map_err(io_err)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
    let mut data = vec![0u8; len as usize];
    file.read_exact(&mut data).await.map_err(io_err)?;
    Ok(data)
}
