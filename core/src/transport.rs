//! Live transport executing `HttpRequest` values.
//!
//! # Design
//! `Transport` is the seam between the call layer and real I/O. The bundled
//! `UreqTransport` runs blocking `ureq` calls on tokio's blocking pool and
//! never turns an HTTP status into an error; status interpretation belongs
//! to `NetworkContext::submit`.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{header, Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::stub::join_error_kind;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    /// Headers every request starts from.
    fn default_headers(&self) -> Headers {
        Vec::new()
    }

    /// Drop every cached response.
    fn clear_cache(&self) {}
}

/// A stored response and the instant it stops being fresh.
#[derive(Debug, Clone)]
struct CacheEntry {
    response: HttpResponse,
    expires_at: Instant,
}

type ResponseCache = Arc<Mutex<HashMap<String, CacheEntry>>>;

/// `ureq`-backed transport with a cache for GET responses.
///
/// Entries are keyed by URL and `Authorization` value, so one session never
/// sees another's response. Only responses whose `Cache-Control` grants a
/// positive `max-age` are stored, and they expire after it.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    cache: ResponseCache,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::from_agent(ureq::Agent::config_builder().http_status_as_error(false).build().new_agent())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(Some(timeout))
                .build()
                .new_agent(),
        )
    }

    /// Wrap a preconfigured agent. It must not treat HTTP statuses as errors.
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            cache: Arc::default(),
        }
    }

    pub fn cached_len(&self) -> usize {
        lock(&self.cache).len()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(cache: &ResponseCache) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cache_key(request: &HttpRequest) -> String {
    match header(&request.headers, "authorization") {
        Some(auth) => format!("{auth} {}", request.url),
        None => request.url.clone(),
    }
}

/// How long a response may be served from cache, per its `Cache-Control`.
///
/// `None` when the header is missing, forbids storing, or gives no positive
/// `max-age`.
pub fn cache_lifetime(headers: &[(String, String)]) -> Option<Duration> {
    let value = header(headers, "cache-control")?;
    let mut max_age = None;
    for directive in value.split(',').map(str::trim) {
        let directive = directive.to_ascii_lowercase();
        if directive == "no-store" || directive == "no-cache" {
            return None;
        }
        if let Some(secs) = directive.strip_prefix("max-age=") {
            max_age = secs.trim_matches('"').parse::<u64>().ok();
        }
    }
    max_age.filter(|secs| *secs > 0).map(Duration::from_secs)
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let cacheable = request.should_cache && request.method == HttpMethod::Get;
        let key = cache_key(&request);
        if cacheable {
            let mut cache = lock(&self.cache);
            if let Some(entry) = cache.get(&key) {
                if entry.expires_at > Instant::now() {
                    log::debug!("cache hit for {}", request.url);
                    return Ok(entry.response.clone());
                }
            }
            if cache.remove(&key).is_some() {
                log::debug!("cache entry for {} expired", request.url);
            }
        }

        let agent = self.agent.clone();
        let response = tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Unknown { kind: join_error_kind(&e).to_string() })??;

        if cacheable && response.status < 300 {
            if let Some(lifetime) = cache_lifetime(&response.headers) {
                let entry = CacheEntry {
                    response: response.clone(),
                    expires_at: Instant::now() + lifetime,
                };
                lock(&self.cache).insert(key, entry);
            }
        }
        Ok(response)
    }

    fn default_headers(&self) -> Headers {
        vec![("Accept".to_string(), "application/json".to_string())]
    }

    fn clear_cache(&self) {
        lock(&self.cache).clear();
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
        ..
    } = request;
    log::debug!("{} {url}", method.as_str());

    let result = match method {
        HttpMethod::Get => with_headers(agent.get(&url), &headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(&url), &headers).call(),
        HttpMethod::Post => send(with_headers(agent.post(&url), &headers), body),
        HttpMethod::Put => send(with_headers(agent.put(&url), &headers), body),
        HttpMethod::Patch => send(with_headers(agent.patch(&url), &headers), body),
    };
    let mut response = result.map_err(map_ureq_error)?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = response.body_mut().read_to_vec().map_err(map_ureq_error)?;

    Ok(HttpResponse { status, headers, body })
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

/// Sort transport failures into the categories presenters care about.
pub fn map_ureq_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Timeout(_) => ApiError::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => ApiError::NoConnection,
        ureq::Error::Io(e) => map_io_error(&e),
        other => ApiError::Transport(other.to_string()),
    }
}

fn map_io_error(err: &io::Error) -> ApiError {
    match err.kind() {
        io::ErrorKind::TimedOut => ApiError::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => ApiError::NoConnection,
        _ => ApiError::Transport(err.to_string()),
    }
}
