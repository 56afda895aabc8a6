//! HTTP client for the remote extraction API
//!
//! Endpoints (all bearer-authenticated):
//!   POST /api/extract-pdf                 multipart `fileId` + `options` JSON
//!   GET  /api/extraction-status/{id}      poll until completed or failed
//!   GET  /api/download/{id}?format=...    raw export of a completed run

use super::traits::{
    ExtractedContent, ExtractionError, ExtractionOptions, ExtractionResult, Extractor,
};
use crate::config::ApiConfig;
use crate::report::{ExtractedChart, ExtractedTable, Insight, ReportRecord};
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;

/// Server-side state of an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Processing,
    Completed,
    Failed,
}

/// Reply to a submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub id: String,
    pub status: ExtractionStatus,
}

/// Reply to a status check; data fields are filled once completed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    #[serde(default)]
    pub report_id: Option<String>,
    pub status: ExtractionStatus,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
    #[serde(default)]
    pub charts: Vec<ExtractedChart>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub vectorized: Option<bool>,
    #[serde(default)]
    pub chunks: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn into_content(self) -> ExtractedContent {
        ExtractedContent {
            source_id: Some(self.id),
            text: self.text,
            tables: self.tables,
            charts: self.charts,
            insights: self.insights,
            summary: self.summary,
            industry: self.industry,
            vectorized: self.vectorized,
            chunks: self.chunks,
        }
    }
}

/// Error body shapes: FastAPI uses `detail`, other services `message`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<String>,
    message: Option<String>,
}

/// Extractor backed by the remote extraction API
pub struct HttpExtractor {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpExtractor {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Submit a report for extraction
    pub async fn submit(
        &self,
        file_id: &str,
        options: &ExtractionOptions,
    ) -> ExtractionResult<SubmitResponse> {
        let form = Form::new()
            .text("fileId", file_id.to_string())
            .text("options", serde_json::to_string(options)?);
        let response = self
            .client
            .post(self.url("/api/extract-pdf"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch the current state of a run
    pub async fn status(&self, extraction_id: &str) -> ExtractionResult<StatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("/api/extraction-status/{}", extraction_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Download the output of a completed run in the given format
    pub async fn download(&self, extraction_id: &str, format: &str) -> ExtractionResult<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/api/download/{}", extraction_id)))
            .query(&[("format", format)])
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    /// Poll a run until it completes, fails, or the poll budget runs out
    pub async fn wait_for_completion(&self, extraction_id: &str) -> ExtractionResult<StatusResponse> {
        for attempt in 1..=self.config.max_polls {
            let status = self.status(extraction_id).await?;
            match status.status {
                ExtractionStatus::Completed => return Ok(status),
                ExtractionStatus::Failed => {
                    return Err(ExtractionError::Failed(
                        status.error.unwrap_or_else(|| "unknown error".to_string()),
                    ))
                }
                ExtractionStatus::Processing => {
                    tracing::debug!(extraction_id, attempt, "Extraction still processing");
                    if attempt < self.config.max_polls {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }
        }
        Err(ExtractionError::Timeout {
            polls: self.config.max_polls,
        })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn extract(
        &self,
        report: &ReportRecord,
        options: &ExtractionOptions,
    ) -> ExtractionResult<ExtractedContent> {
        let submitted = self.submit(report.id.as_str(), options).await?;
        tracing::info!(
            report_id = %report.id,
            extraction_id = %submitted.id,
            "Submitted report for extraction"
        );
        let finished = self.wait_for_completion(&submitted.id).await?;
        Ok(finished.into_content())
    }
}

/// Turn non-2xx responses into `ExtractionError::Api`
async fn check(response: reqwest::Response) -> ExtractionResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail.or(b.message))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });
    Err(ExtractionError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FileMeta, ReportRecord};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned response per connection, recording each raw request.
    async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            requests
        });
        (base, task)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let head = text[..header_end].to_ascii_lowercase();
            let body_len = text.len() - header_end - 4;
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let complete = match content_length {
                Some(len) => body_len >= len,
                None if head.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
                None => true,
            };
            if complete {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn extractor(base_url: String, max_polls: u32) -> HttpExtractor {
        HttpExtractor::new(ApiConfig {
            base_url,
            api_key: "test-key".to_string(),
            poll_interval: Duration::from_millis(10),
            max_polls,
        })
    }

    fn report() -> ReportRecord {
        ReportRecord::new(FileMeta::new("Q1.pdf", 2048, "application/pdf", 1000))
    }

    fn completed_body() -> String {
        serde_json::json!({
            "id": "task-1",
            "reportId": "r1",
            "status": "completed",
            "text": ["page one", "page two"],
            "tables": [{"id": "table-1", "title": "Share", "data": [["A", "1"]], "page": 2}],
            "charts": [],
            "insights": [{"id": "insight-1", "text": "Growth", "confidence": 0.92, "category": "Market Trends"}],
            "summary": "A summary",
            "industry": "Technology",
            "vectorized": true,
            "chunks": 24,
            "created_at": "2024-05-27T09:33:20",
            "updated_at": "2024-05-27T09:33:25"
        })
        .to_string()
    }

    #[tokio::test]
    async fn extract_submits_then_polls_until_complete() {
        let (base, server) = serve(vec![
            (200, r#"{"id":"task-1","status":"processing"}"#.to_string()),
            (200, r#"{"id":"task-1","reportId":"r1","status":"processing"}"#.to_string()),
            (200, completed_body()),
        ])
        .await;
        let report = report();

        let content = extractor(base, 5)
            .extract(&report, &ExtractionOptions::default())
            .await
            .unwrap();
        assert_eq!(content.source_id.as_deref(), Some("task-1"));
        assert_eq!(content.text, vec!["page one", "page two"]);
        assert_eq!(content.tables[0].title, "Share");
        assert_eq!(content.chunks, Some(24));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/extract-pdf"));
        assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert!(requests[0].contains("name=\"fileId\""));
        assert!(requests[0].contains(report.id.as_str()));
        assert!(requests[0].contains("\"extractText\":true"));
        assert!(requests[1].starts_with("GET /api/extraction-status/task-1"));
    }

    #[tokio::test]
    async fn failed_status_surfaces_error_text() {
        let (base, _server) = serve(vec![(
            200,
            r#"{"id":"task-1","status":"failed","error":"corrupt pdf"}"#.to_string(),
        )])
        .await;

        let err = extractor(base, 3).wait_for_completion("task-1").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Failed(msg) if msg == "corrupt pdf"));
    }

    #[tokio::test]
    async fn gives_up_after_max_polls() {
        let processing = r#"{"id":"task-1","status":"processing"}"#.to_string();
        let (base, _server) = serve(vec![(200, processing.clone()), (200, processing)]).await;

        let err = extractor(base, 2).wait_for_completion("task-1").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { polls: 2 }));
    }

    #[tokio::test]
    async fn api_errors_carry_detail() {
        let (base, _server) = serve(vec![(
            404,
            r#"{"detail":"Extraction task not found"}"#.to_string(),
        )])
        .await;

        let err = extractor(base, 1).status("missing").await.unwrap_err();
        match err {
            ExtractionError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Extraction task not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn download_passes_format() {
        let (base, server) = serve(vec![(200, r#"{"id":"task-1"}"#.to_string())]).await;

        let bytes = extractor(base, 1).download("task-1", "csv").await.unwrap();
        assert_eq!(bytes, br#"{"id":"task-1"}"#.to_vec());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/download/task-1?format=csv"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let extractor = extractor("http://localhost:8000/".to_string(), 1);
        assert_eq!(
            extractor.url("/api/extract-pdf"),
            "http://localhost:8000/api/extract-pdf"
        );
    }
}
