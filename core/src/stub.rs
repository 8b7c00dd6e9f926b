//! Canned responses served in place of the live transport.
//!
//! # Design
//! A `StubHolder` rides along with a request. When the context's stub
//! policy accepts it, the fixture text goes through the request's own parser,
//! so a stubbed call exercises the same decode path as a live one. Only
//! success-looking stubs (status below 300) are ever served; stubs with an
//! error status leave the request to the live transport.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ApiError;
use crate::request::JsonRequest;

/// Directory under the fixture root that holds stub files.
pub const STUB_NAMESPACE: &str = "stubfiles";

/// Fixture attached to a request. `stub_string` wins over `stub_file_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubHolder {
    pub status_code: u16,
    pub stub_file_name: Option<String>,
    pub stub_string: Option<String>,
}

impl Default for StubHolder {
    fn default() -> Self {
        Self {
            status_code: 200,
            stub_file_name: None,
            stub_string: None,
        }
    }
}

impl StubHolder {
    pub fn from_string(json: impl Into<String>) -> Self {
        Self {
            stub_string: Some(json.into()),
            ..Self::default()
        }
    }

    pub fn from_file(name: impl Into<String>) -> Self {
        Self {
            stub_file_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Whether this stub would be served at all.
    pub fn maybe_stub(&self) -> bool {
        self.status_code < 300
    }
}

/// Loads stub files from `<root>/stubfiles/`.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(STUB_NAMESPACE).join(name)
    }

    pub fn load(&self, name: &str) -> Result<String, ApiError> {
        let path = self.path_for(name);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ApiError::FixtureNotFound(path),
            _ => ApiError::Transport(format!("failed to read {}: {e}", path.display())),
        })
    }
}

impl Default for FixtureStore {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Fixture text for a stub, from its string or its file.
pub fn resolve_fixture(stub: &StubHolder, fixtures: &FixtureStore) -> Result<String, ApiError> {
    match (&stub.stub_string, &stub.stub_file_name) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(name)) => fixtures.load(name),
        (None, None) => Err(ApiError::Config("stub has neither a string nor a file name".into())),
    }
}

/// Feed the request's stub through its parser.
///
/// With `same_thread` the parser runs inline; otherwise it runs on the
/// blocking pool and the result is handed back to the awaiting task, the
/// way a live response would arrive.
pub async fn serve_stub<T>(request: JsonRequest<T>, fixtures: &FixtureStore, same_thread: bool) -> Result<Option<T>, ApiError>
where
    T: Send + 'static,
{
    let stub = request
        .stub()
        .ok_or_else(|| ApiError::Config(format!("no stub attached to {}", request.url())))?;
    let text = resolve_fixture(stub, fixtures)?;
    log::debug!("serving stub for {} {} (same_thread={same_thread})", request.method().as_str(), request.url());

    if same_thread {
        return request.parse_text(&text);
    }
    let parser = request.parser();
    tokio::task::spawn_blocking(move || parser(&text))
        .await
        .map_err(|e| ApiError::Unknown { kind: join_error_kind(&e).to_string() })?
}

pub(crate) fn join_error_kind(err: &tokio::task::JoinError) -> &'static str {
    if err.is_cancelled() {
        "Cancelled"
    } else {
        "Panicked"
    }
}
