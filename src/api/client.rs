use super::types::{
    ChunkReceipt, ChunkUpload, CommitReceipt, CommitRequest, InitResponse, NewProject, Page,
    Project, ProjectQuery,
};
use super::{ImportApi, ProjectsApi};
use crate::config::ImportConfig;
use crate::error::{Result, UploadError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

/// HTTP client for a single project's import endpoints.
#[derive(Clone)]
pub struct ServerClient {
    client: reqwest::Client,
    base_url: String,
    project_id: u64,
    headers: HeaderMap,
}

impl ServerClient {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        config.validate_connection()?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_str(&key.to_lowercase())
                .map_err(|e| UploadError::Config(format!("invalid header name {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| UploadError::Config(format!("invalid value for {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            project_id: config.project_id,
            headers,
        })
    }

    fn import_url(&self, step: &str) -> String {
        format!(
            "{}/api/projects/{}/tasks/import/external/{}",
            self.base_url, self.project_id, step
        )
    }

    fn projects_url(&self) -> String {
        format!("{}/api/projects/", self.base_url)
    }
}

#[async_trait]
impl ImportApi for ServerClient {
    async fn init(&self) -> Result<String> {
        let response = self
            .client
            .post(self.import_url("init"))
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::transport(format!(
                "Init failed with status: {}",
                status
            )));
        }

        let body: InitResponse = response.json().await?;
        if body.uuid.is_empty() {
            return Err(UploadError::UnexpectedResponse(
                "init returned an empty session token".into(),
            ));
        }
        Ok(body.uuid)
    }

    async fn upload_chunk(&self, token: &str, chunk: ChunkUpload) -> Result<ChunkReceipt> {
        let field = chunk.kind.key();
        let index = chunk.index;
        let total = chunk.total_chunks;

        let form = Form::new()
            .text("uuid", token.to_string())
            .text("dzuuid", format!("{}-{}", token, field))
            .text("dzchunkindex", chunk.index.to_string())
            .text("dztotalfilesize", chunk.total_file_size.to_string())
            .text("dzchunksize", chunk.chunk_size.to_string())
            .text("dztotalchunkcount", chunk.total_chunks.to_string())
            .text("dzchunkbyteoffset", chunk.byte_offset.to_string())
            .part(field, Part::bytes(chunk.data).file_name(chunk.file_name));

        let response = self
            .client
            .post(self.import_url("upload"))
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::transport(format!(
                "Chunk {}/{} of {} failed with status: {}",
                index + 1,
                total,
                field,
                status
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!(slot = field, error = %e, "ignoring unparseable chunk receipt");
            ChunkReceipt::default()
        }))
    }

    async fn commit(&self, token: &str, name: &str) -> Result<CommitReceipt> {
        let response = self
            .client
            .post(self.import_url("commit"))
            .headers(self.headers.clone())
            .json(&CommitRequest { uuid: token, name })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_commit_response(status, &body)
    }
}

#[async_trait]
impl ProjectsApi for ServerClient {
    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        project.validate()?;

        let response = self
            .client
            .post(self.projects_url())
            .headers(self.headers.clone())
            .json(project)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let result = parse_project_response(status, &body);
        if let Err(UploadError::ServerRejection(reason)) = &result {
            warn!(reason = %reason, "project creation rejected");
        }
        result
    }

    async fn list_projects(&self, query: &ProjectQuery) -> Result<Page<Project>> {
        let response = self
            .client
            .get(self.projects_url())
            .headers(self.headers.clone())
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::transport(format!(
                "Listing projects failed with status: {}",
                status
            )));
        }
        Ok(response.json().await?)
    }
}

/// Interprets the commit endpoint's answer.
///
/// A 400 carrying a non-empty JSON list of strings is a validation failure
/// to show as-is. Any other 400 body is ambiguous and not retried.
pub fn parse_commit_response(status: u16, body: &str) -> Result<CommitReceipt> {
    match status {
        200..=299 => serde_json::from_str(body).map_err(|e| {
            UploadError::UnexpectedResponse(format!("invalid commit response: {}", e))
        }),
        400 => match serde_json::from_str::<Vec<String>>(body) {
            Ok(errors) if !errors.is_empty() => {
                Err(UploadError::ServerRejection(errors.join(", ")))
            }
            _ => Err(UploadError::UnexpectedResponse(format!(
                "commit rejected with an unrecognized body: {}",
                body.chars().take(200).collect::<String>()
            ))),
        },
        code => Err(UploadError::transport(format!(
            "Commit failed with status: {}",
            code
        ))),
    }
}

/// Interprets the project creation answer.
///
/// Field errors come back as `{"field": ["message", ...]}` or as a plain
/// list of messages; both become one readable line.
pub fn parse_project_response(status: u16, body: &str) -> Result<Project> {
    match status {
        200..=299 => serde_json::from_str(body).map_err(|e| {
            UploadError::UnexpectedResponse(format!("invalid project response: {}", e))
        }),
        400 => match field_errors(body) {
            Some(reason) => Err(UploadError::ServerRejection(reason)),
            None => Err(UploadError::UnexpectedResponse(format!(
                "project rejected with an unrecognized body: {}",
                body.chars().take(200).collect::<String>()
            ))),
        },
        code => Err(UploadError::transport(format!(
            "Project creation failed with status: {}",
            code
        ))),
    }
}

fn field_errors(body: &str) -> Option<String> {
    fn messages(value: &Value) -> Vec<String> {
        match value {
            Value::String(text) => vec![text.clone()],
            Value::Array(items) => items.iter().flat_map(messages).collect(),
            _ => Vec::new(),
        }
    }

    let lines: Vec<String> = match serde_json::from_str::<Value>(body).ok()? {
        Value::Object(fields) => fields
            .iter()
            .flat_map(|(field, value)| {
                messages(value).into_iter().map(move |m| match field.as_str() {
                    "non_field_errors" | "detail" => m,
                    _ => format!("{}: {}", field, m),
                })
            })
            .collect(),
        other => messages(&other),
    };

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(", "))
    }
}
