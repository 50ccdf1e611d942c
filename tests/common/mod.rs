//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use doc_gateway::config::{BuildTarget, GatewayConfig, RouteConfig};
use doc_gateway::upstream::{
    CompileResult, CompileStatus, DocumentService, FileId, OutputFileRef, RevisionDescriptor, UpstreamError,
    UpstreamResult,
};

/// Bytes the fake service produces for `link` at `revision`.
pub fn pdf_bytes(link: &str, revision: u64) -> Bytes {
    Bytes::from(format!("%PDF-1.5 {} r{}", link, revision))
}

pub fn target(link: &str) -> BuildTarget {
    BuildTarget {
        link: link.to_string(),
        main_file: None,
    }
}

/// Config with the given routes and settings suitable for tests.
pub fn config(routes: &[(&str, BuildTarget)]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.routes = routes
        .iter()
        .map(|(path, target)| RouteConfig {
            path: path.to_string(),
            target: target.clone(),
        })
        .collect();
    config.refresh.session_timeout_secs = 5;
    config
}

/// What the next compile of a project does.
#[derive(Debug, Clone)]
pub enum CompileScript {
    /// Build the current revision.
    Build,
    /// Return this status without output.
    Status(CompileStatus),
    /// Report success but no PDF.
    SuccessNoPdf,
    /// Fail the call itself.
    Error(UpstreamError),
}

/// Session handed out by [`FakeService`].
#[derive(Debug, Clone)]
pub struct FakeSession {
    pub link: String,
    pub generation: u64,
}

#[derive(Default)]
struct Project {
    revision: u64,
    files: HashSet<String>,
    scripts: VecDeque<CompileScript>,
    history_errors: VecDeque<UpstreamError>,
    valid_from_generation: u64,
    generation: u64,
    open_failures: usize,
    opens: usize,
    compiles: usize,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Default)]
struct FakeState {
    projects: HashMap<String, Project>,
    outputs: HashMap<String, Bytes>,
    compile_log: Vec<String>,
    compile_delay: Option<Duration>,
}

/// Scripted in-memory document service.
#[derive(Default)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_project<R>(&self, link: &str, f: impl FnOnce(&mut Project) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.projects.entry(link.to_string()).or_default())
    }

    pub fn set_revision(&self, link: &str, revision: u64) {
        self.with_project(link, |p| p.revision = revision);
    }

    pub fn add_file(&self, link: &str, path: &str) {
        self.with_project(link, |p| {
            p.files.insert(path.to_string());
        });
    }

    pub fn push_compile(&self, link: &str, script: CompileScript) {
        self.with_project(link, |p| p.scripts.push_back(script));
    }

    pub fn push_history_error(&self, link: &str, error: UpstreamError) {
        self.with_project(link, |p| p.history_errors.push_back(error));
    }

    /// Invalidate every session opened so far for `link`.
    pub fn expire_sessions(&self, link: &str) {
        self.with_project(link, |p| p.valid_from_generation = p.generation + 1);
    }

    pub fn fail_next_opens(&self, link: &str, count: usize) {
        self.with_project(link, |p| p.open_failures = count);
    }

    pub fn set_compile_delay(&self, delay: Duration) {
        self.state.lock().unwrap().compile_delay = Some(delay);
    }

    pub fn compile_count(&self, link: &str) -> usize {
        self.with_project(link, |p| p.compiles)
    }

    pub fn open_count(&self, link: &str) -> usize {
        self.with_project(link, |p| p.opens)
    }

    pub fn max_in_flight(&self, link: &str) -> usize {
        self.with_project(link, |p| p.max_in_flight)
    }

    /// Links in the order their compiles started.
    pub fn compile_log(&self) -> Vec<String> {
        self.state.lock().unwrap().compile_log.clone()
    }

    fn check_session(&self, session: &FakeSession) -> UpstreamResult<()> {
        self.with_project(&session.link, |p| {
            if session.generation < p.valid_from_generation {
                Err(UpstreamError::Unauthorized("session expired".into()))
            } else {
                Ok(())
            }
        })
    }
}

#[async_trait]
impl DocumentService for FakeService {
    type Session = FakeSession;

    async fn open_session(&self, link: &str, _timeout: Duration) -> UpstreamResult<FakeSession> {
        self.with_project(link, |p| {
            p.opens += 1;
            if p.open_failures > 0 {
                p.open_failures -= 1;
                return Err(UpstreamError::Network("connection refused".into()));
            }
            p.generation += 1;
            Ok(FakeSession {
                link: link.to_string(),
                generation: p.generation,
            })
        })
    }

    async fn revision_history(&self, session: &FakeSession) -> UpstreamResult<Vec<RevisionDescriptor>> {
        self.check_session(session)?;
        self.with_project(&session.link, |p| {
            if let Some(err) = p.history_errors.pop_front() {
                return Err(err);
            }
            Ok(match p.revision {
                0 => Vec::new(),
                r => vec![
                    RevisionDescriptor { to_version: r },
                    RevisionDescriptor { to_version: r - 1 },
                ],
            })
        })
    }

    async fn resolve_path(&self, session: &FakeSession, path: &str) -> UpstreamResult<Option<FileId>> {
        self.check_session(session)?;
        Ok(self.with_project(&session.link, |p| {
            p.files.contains(path).then(|| FileId(format!("doc-{}", path)))
        }))
    }

    async fn compile(
        &self,
        session: &FakeSession,
        _root: Option<&FileId>,
        stop_on_first_error: bool,
    ) -> UpstreamResult<CompileResult> {
        assert!(stop_on_first_error);
        self.check_session(session)?;

        let (script, delay) = {
            let mut state = self.state.lock().unwrap();
            state.compile_log.push(session.link.clone());
            let delay = state.compile_delay;
            let p = state.projects.entry(session.link.clone()).or_default();
            p.compiles += 1;
            p.in_flight += 1;
            p.max_in_flight = p.max_in_flight.max(p.in_flight);
            (p.scripts.pop_front().unwrap_or(CompileScript::Build), delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let p = state.projects.entry(session.link.clone()).or_default();
        p.in_flight -= 1;
        let revision = p.revision;

        match script {
            CompileScript::Build => {
                let url = format!("/build/{}/{}/output.pdf", session.link, revision);
                state.outputs.insert(url.clone(), pdf_bytes(&session.link, revision));
                Ok(CompileResult {
                    status: CompileStatus::Success,
                    pdf: Some(OutputFileRef {
                        path: "output.pdf".into(),
                        url,
                    }),
                })
            }
            CompileScript::Status(status) => Ok(CompileResult { status, pdf: None }),
            CompileScript::SuccessNoPdf => Ok(CompileResult {
                status: CompileStatus::Success,
                pdf: None,
            }),
            CompileScript::Error(e) => Err(e),
        }
    }

    async fn fetch_file(&self, session: &FakeSession, output: &OutputFileRef) -> UpstreamResult<Bytes> {
        self.check_session(session)?;
        self.state
            .lock()
            .unwrap()
            .outputs
            .get(&output.url)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(output.url.clone()))
    }
}

/// State behind the mock upstream HTTP server.
#[derive(Default)]
pub struct MockUpstream {
    pub revision: u64,
    pub compile_status: String,
    pub pdf: Vec<u8>,
    pub files: HashMap<String, String>,
    pub reject_sessions: bool,
    pub valid_token: Option<String>,
    pub sessions_opened: usize,
    pub compiles: usize,
    pub last_compile_body: Option<Value>,
}

impl MockUpstream {
    pub fn new(revision: u64, pdf: &[u8]) -> Self {
        Self {
            revision,
            compile_status: "success".into(),
            pdf: pdf.to_vec(),
            ..Default::default()
        }
    }
}

pub type SharedUpstream = Arc<Mutex<MockUpstream>>;

/// Start a mock document service on an ephemeral port.
pub async fn start_mock_upstream(state: SharedUpstream) -> SocketAddr {
    let app = Router::new()
        .route("/api/sessions", post(open_session))
        .route("/api/projects/{id}/updates", get(updates))
        .route("/api/projects/{id}/entities", get(entities))
        .route("/api/projects/{id}/compile", post(compile))
        .route("/build/{id}/output.pdf", get(output))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn authorized(state: &MockUpstream, headers: &HeaderMap) -> bool {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    matches!((presented, &state.valid_token), (Some(p), Some(v)) if p == v)
}

async fn open_session(State(state): State<SharedUpstream>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    if s.reject_sessions || body.get("link").and_then(Value::as_str).is_none() {
        return StatusCode::FORBIDDEN.into_response();
    }
    s.sessions_opened += 1;
    let token = format!("tok-{}", s.sessions_opened);
    s.valid_token = Some(token.clone());
    Json(json!({ "token": token, "project_id": "p1" })).into_response()
}

async fn updates(State(state): State<SharedUpstream>, headers: HeaderMap) -> Response {
    let s = state.lock().unwrap();
    if !authorized(&s, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "updates": [{ "toV": s.revision }, { "toV": s.revision.saturating_sub(1) }] })).into_response()
}

async fn entities(
    State(state): State<SharedUpstream>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let s = state.lock().unwrap();
    if !authorized(&s, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("path").and_then(|p| s.files.get(p)) {
        Some(id) => Json(json!({ "id": id })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn compile(
    State(state): State<SharedUpstream>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().unwrap();
    if !authorized(&s, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.compiles += 1;
    s.last_compile_body = Some(body);
    let outputs = if s.compile_status == "success" {
        json!([
            { "path": "output.log", "url": format!("/build/{}/output.log", id) },
            { "path": "output.pdf", "url": format!("/build/{}/output.pdf", id) },
        ])
    } else {
        json!([])
    };
    Json(json!({ "status": s.compile_status, "outputFiles": outputs })).into_response()
}

async fn output(State(state): State<SharedUpstream>, headers: HeaderMap) -> Response {
    let s = state.lock().unwrap();
    if !authorized(&s, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.pdf.clone().into_response()
}
