use crate::config::ImportConfig;
use crate::error::{Result, UploadError};
use std::collections::BTreeMap;

/// Headers that describe the copied request's body rather than the session.
const SKIPPED_HEADERS: [&str; 4] = ["content-type", "content-length", "host", "accept-encoding"];

/// Session details lifted from a browser "Copy as cURL" command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurlRequest {
    pub server: String,
    pub project_id: u64,
    pub headers: BTreeMap<String, String>,
}

impl CurlRequest {
    pub fn parse(curl_text: &str) -> Result<Self> {
        let url = extract_url(curl_text)
            .ok_or_else(|| UploadError::Config("Could not find a URL in curl command".into()))?;

        let scheme_end = url
            .find("://")
            .ok_or_else(|| UploadError::Config(format!("URL has no scheme: {}", url)))?;
        let host_end = url[scheme_end + 3..]
            .find('/')
            .map_or(url.len(), |i| scheme_end + 3 + i);
        let server = url[..host_end].to_string();

        let project_id = url
            .find("/api/projects/")
            .and_then(|start| {
                let rest = &url[start + "/api/projects/".len()..];
                let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
                rest[..end].parse::<u64>().ok()
            })
            .ok_or_else(|| {
                UploadError::Config("Could not find project ID in curl command".into())
            })?;

        let mut headers = BTreeMap::new();
        for (flag, value) in quoted_arguments(curl_text) {
            match flag {
                "-H" | "--header" => {
                    let Some((key, value)) = value.split_once(':') else {
                        continue;
                    };
                    let key = key.trim().to_lowercase();
                    if SKIPPED_HEADERS.contains(&key.as_str()) {
                        continue;
                    }
                    headers.insert(key, value.trim().to_string());
                }
                "-b" | "--cookie" => {
                    headers.insert("cookie".to_string(), value.to_string());
                }
                _ => {}
            }
        }

        // Django checks these on authenticated POSTs.
        headers
            .entry("origin".to_string())
            .or_insert_with(|| server.clone());
        headers
            .entry("referer".to_string())
            .or_insert_with(|| format!("{}/dashboard/", server));

        Ok(Self {
            server,
            project_id,
            headers,
        })
    }

    /// Fills the connection fields of `config`; explicit headers win.
    pub fn apply_to(&self, config: &mut ImportConfig) {
        config.server = self.server.clone();
        config.project_id = self.project_id;
        for (key, value) in &self.headers {
            config
                .headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn extract_url(curl_text: &str) -> Option<String> {
    let rest = curl_text.trim_start().strip_prefix("curl")?;
    let mut args = quoted_arguments(rest).into_iter();
    if let Some(("", url)) = args.next() {
        return Some(url.to_string());
    }
    rest.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        .map(|word| word.trim_matches(|c| c == '\'' || c == '"').to_string())
}

/// Quoted arguments paired with the flag right before them (empty if none).
fn quoted_arguments(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut flag = "";
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '\\');
        if rest.is_empty() {
            break;
        }

        let quote = rest.chars().next().unwrap_or(' ');
        if quote == '\'' || quote == '"' {
            let body = &rest[1..];
            let end = body.find(quote).unwrap_or(body.len());
            out.push((flag, &body[..end]));
            flag = "";
            rest = body.get(end + 1..).unwrap_or("");
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace())
                .unwrap_or(rest.len());
            let word = &rest[..end];
            flag = if word.starts_with('-') { word } else { "" };
            rest = &rest[end..];
        }
    }
    out
}
