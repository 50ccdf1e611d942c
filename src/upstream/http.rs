//! HTTP implementation of the document service client.
//!
//! # Responsibilities
//! - Exchange a project link for a bearer session
//! - Query revision history, resolve paths, trigger compiles
//! - Download build outputs
//! - Map HTTP and transport failures onto [`UpstreamError`]

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::schema::UpstreamConfig;
use crate::upstream::client::DocumentService;
use crate::upstream::types::{
    CompileResult, CompileStatus, FileId, OutputFileRef, RevisionDescriptor, UpstreamError, UpstreamResult,
};

/// Name of the primary build output.
const PDF_OUTPUT_PATH: &str = "output.pdf";

/// Session issued by the document service for one project.
#[derive(Debug, Clone)]
pub struct HttpSession {
    origin: Url,
    project_id: String,
    token: String,
}

impl HttpSession {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn endpoint(&self, path: &str) -> UpstreamResult<Url> {
        self.origin
            .join(path)
            .map_err(|e| UpstreamError::Protocol(format!("invalid endpoint `{}`: {}", path, e)))
    }
}

/// Document service client over HTTP/JSON.
#[derive(Clone)]
pub struct HttpDocumentService {
    client: Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    link: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
    project_id: String,
}

#[derive(Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    updates: Vec<RevisionDescriptor>,
}

#[derive(Deserialize)]
struct EntityResponse {
    id: FileId,
}

#[derive(Serialize)]
struct CompileRequest<'a> {
    #[serde(rename = "rootDocId", skip_serializing_if = "Option::is_none")]
    root_doc_id: Option<&'a FileId>,
    #[serde(rename = "stopOnFirstError")]
    stop_on_first_error: bool,
}

#[derive(Deserialize)]
struct CompileResponse {
    status: CompileStatus,
    #[serde(default, rename = "outputFiles")]
    output_files: Vec<OutputFileRef>,
}

impl HttpDocumentService {
    /// Create a new client.
    pub fn new(config: &UpstreamConfig) -> UpstreamResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("doc-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn send(&self, request: RequestBuilder) -> UpstreamResult<Response> {
        let response = request.send().await.map_err(|e| self.map_error(e))?;
        check_status(response)
    }

    fn map_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout_secs)
        } else if e.is_decode() {
            UpstreamError::Protocol(e.to_string())
        } else {
            UpstreamError::Network(e.to_string())
        }
    }

    async fn json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> UpstreamResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| self.map_error(e))
    }
}

fn check_status(response: Response) -> UpstreamResult<Response> {
    let status = response.status();
    let url = response.url().to_string();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(UpstreamError::Unauthorized(format!("{} returned {}", url, status)))
        }
        StatusCode::NOT_FOUND => Err(UpstreamError::NotFound(url)),
        _ => Err(UpstreamError::Protocol(format!("{} returned {}", url, status))),
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    type Session = HttpSession;

    async fn open_session(&self, link: &str, timeout: Duration) -> UpstreamResult<HttpSession> {
        let link_url = Url::parse(link)
            .map_err(|e| UpstreamError::Protocol(format!("invalid link `{}`: {}", link, e)))?;
        let origin = Url::parse(&link_url.origin().ascii_serialization())
            .map_err(|e| UpstreamError::Protocol(format!("link `{}` has no usable origin: {}", link, e)))?;
        let endpoint = origin
            .join("/api/sessions")
            .map_err(|e| UpstreamError::Protocol(e.to_string()))?;

        let request = self.client.post(endpoint).json(&SessionRequest { link });
        let response: SessionResponse = tokio::time::timeout(timeout, self.json(request))
            .await
            .map_err(|_| UpstreamError::Timeout(timeout.as_secs()))??;

        tracing::debug!(link = %link, project_id = %response.project_id, "Upstream session opened");

        Ok(HttpSession {
            origin,
            project_id: response.project_id,
            token: response.token,
        })
    }

    async fn revision_history(&self, session: &HttpSession) -> UpstreamResult<Vec<RevisionDescriptor>> {
        let url = session.endpoint(&format!("/api/projects/{}/updates", session.project_id))?;
        let body: UpdatesResponse = self.json(self.client.get(url).bearer_auth(&session.token)).await?;
        Ok(body.updates)
    }

    async fn resolve_path(&self, session: &HttpSession, path: &str) -> UpstreamResult<Option<FileId>> {
        let url = session.endpoint(&format!("/api/projects/{}/entities", session.project_id))?;
        let request = self
            .client
            .get(url)
            .query(&[("path", path)])
            .bearer_auth(&session.token);

        match self.json::<EntityResponse>(request).await {
            Ok(entity) => Ok(Some(entity.id)),
            Err(UpstreamError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn compile(
        &self,
        session: &HttpSession,
        root: Option<&FileId>,
        stop_on_first_error: bool,
    ) -> UpstreamResult<CompileResult> {
        let url = session.endpoint(&format!("/api/projects/{}/compile", session.project_id))?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&session.token)
            .json(&CompileRequest {
                root_doc_id: root,
                stop_on_first_error,
            });
        let body: CompileResponse = self.json(request).await?;

        let pdf = body.output_files.into_iter().find(|f| f.path == PDF_OUTPUT_PATH);
        Ok(CompileResult {
            status: body.status,
            pdf,
        })
    }

    async fn fetch_file(&self, session: &HttpSession, output: &OutputFileRef) -> UpstreamResult<Bytes> {
        let url = session.endpoint(&output.url)?;
        let response = self.send(self.client.get(url).bearer_auth(&session.token)).await?;
        response.bytes().await.map_err(|e| self.map_error(e))
    }
}
