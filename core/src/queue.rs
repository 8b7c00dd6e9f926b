//! Dispatch of requests to stubs or the live transport.
//!
//! # Design
//! `NetworkContext` is passed to every call site instead of living in
//! process-wide statics. It owns the server configuration, the transport,
//! the session and the stub knobs. Changing any of them needs `&mut`, so
//! they can only be mutated by whoever owns the context; shared read access
//! goes through `Arc<NetworkContext>`.

use std::fmt;
use std::sync::Arc;

use crate::call::Call;
use crate::codec::{list_parser, single_parser, JsonModel};
use crate::config::ServerConfiguration;
use crate::error::ApiError;
use crate::http::{decode_text, parse_charset, PROTOCOL_CHARSET};
use crate::request::{JsonRequest, ResponseParser};
use crate::session::Session;
use crate::stub::{serve_stub, FixtureStore, StubHolder};
use crate::transport::{Transport, UreqTransport};

type StubPredicate = Arc<dyn Fn(&str, &StubHolder) -> bool + Send + Sync>;

/// Decides, per request, whether an attached stub replaces the network.
#[derive(Clone, Default)]
pub enum StubPolicy {
    /// Always go to the live transport.
    #[default]
    Never,
    /// Serve every attached stub.
    Always,
    /// Serve stubs for which the predicate, given the URL, returns true.
    Matching(StubPredicate),
}

impl StubPolicy {
    pub fn matching(predicate: impl Fn(&str, &StubHolder) -> bool + Send + Sync + 'static) -> Self {
        StubPolicy::Matching(Arc::new(predicate))
    }

    pub fn should_stub(&self, url: &str, stub: &StubHolder) -> bool {
        match self {
            StubPolicy::Never => false,
            StubPolicy::Always => true,
            StubPolicy::Matching(predicate) => predicate(url, stub),
        }
    }
}

impl fmt::Debug for StubPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubPolicy::Never => f.write_str("Never"),
            StubPolicy::Always => f.write_str("Always"),
            StubPolicy::Matching(_) => f.write_str("Matching(..)"),
        }
    }
}

pub struct NetworkContext {
    server: ServerConfiguration,
    transport: Arc<dyn Transport>,
    session: Option<Arc<dyn Session>>,
    stub_policy: StubPolicy,
    same_thread_stubs: bool,
    fixtures: FixtureStore,
}

impl NetworkContext {
    pub fn builder(server: ServerConfiguration) -> NetworkContextBuilder {
        NetworkContextBuilder::new(server)
    }

    pub fn server(&self) -> &ServerConfiguration {
        &self.server
    }

    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    pub fn stub_policy(&self) -> &StubPolicy {
        &self.stub_policy
    }

    pub fn same_thread_stubs(&self) -> bool {
        self.same_thread_stubs
    }

    pub fn set_session(&mut self, session: Option<Arc<dyn Session>>) {
        self.session = session;
    }

    pub fn set_stub_policy(&mut self, policy: StubPolicy) {
        self.stub_policy = policy;
    }

    pub fn set_same_thread_stubs(&mut self, same_thread: bool) {
        self.same_thread_stubs = same_thread;
    }

    /// Swap in a fresh transport, discarding the old one and its cache.
    pub fn replace_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    /// Route a request to its stub or to the live transport.
    ///
    /// A stub is served only when the policy accepts it and its status is
    /// below 300; any other request goes to the transport. Without
    /// `should_cache` the transport cache is cleared first. Statuses of 300
    /// and above come back as `ApiError::Status`. Nothing is retried here.
    pub async fn submit<T>(&self, request: JsonRequest<T>, should_cache: bool) -> Result<Option<T>, ApiError>
    where
        T: Send + 'static,
    {
        if let Some(stub) = request.stub() {
            if self.stub_policy.should_stub(request.url(), stub) && stub.maybe_stub() {
                return serve_stub(request, &self.fixtures, self.same_thread_stubs).await;
            }
        }

        if !should_cache {
            log::debug!("clearing transport cache before {}", request.url());
            self.transport.clear_cache();
        }
        let http = request.to_http_request(self.transport.default_headers(), should_cache);
        let response = self.transport.execute(http).await?;
        log::debug!("{} {} -> {}", request.method().as_str(), request.url(), response.status);

        if response.status >= 300 {
            return Err(ApiError::Status {
                status: response.status,
                body: error_body_text(&response.body, &response.headers),
                headers: response.headers,
            });
        }
        request.build_network_response(&response.body, &response.headers)
    }

    /// Build `call` against this context and submit it.
    pub async fn fetch<T>(&self, call: &Call, parser: ResponseParser<T>) -> Result<Option<T>, ApiError>
    where
        T: Send + 'static,
    {
        let request = call.build_request(&self.server, self.session.as_ref(), parser);
        self.submit(request, call.should_cache).await
    }

    /// Fetch one model wrapped under `T::json_key()`.
    pub async fn fetch_model<T>(&self, call: &Call) -> Result<Option<T>, ApiError>
    where
        T: JsonModel + Send + 'static,
    {
        self.fetch(call, single_parser::<T>()).await
    }

    /// Fetch a list wrapped under `T::plural_json_key()`.
    pub async fn fetch_index<T>(&self, call: &Call) -> Result<Option<Vec<T>>, ApiError>
    where
        T: JsonModel + Send + 'static,
    {
        self.fetch(call, list_parser::<T>()).await
    }
}

/// Error bodies honour the declared charset but never fail to decode.
fn error_body_text(body: &[u8], headers: &[(String, String)]) -> String {
    decode_text(body, &parse_charset(headers, PROTOCOL_CHARSET))
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

pub struct NetworkContextBuilder {
    server: ServerConfiguration,
    transport: Option<Arc<dyn Transport>>,
    session: Option<Arc<dyn Session>>,
    stub_policy: StubPolicy,
    same_thread_stubs: bool,
    fixtures: FixtureStore,
}

impl NetworkContextBuilder {
    pub fn new(server: ServerConfiguration) -> Self {
        Self {
            server,
            transport: None,
            session: None,
            stub_policy: StubPolicy::Never,
            same_thread_stubs: false,
            fixtures: FixtureStore::default(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn stub_policy(mut self, policy: StubPolicy) -> Self {
        self.stub_policy = policy;
        self
    }

    pub fn same_thread_stubs(mut self, same_thread: bool) -> Self {
        self.same_thread_stubs = same_thread;
        self
    }

    pub fn fixtures(mut self, fixtures: FixtureStore) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// Falls back to a default `UreqTransport` when none was given.
    pub fn build(self) -> NetworkContext {
        NetworkContext {
            server: self.server,
            transport: self.transport.unwrap_or_else(|| Arc::new(UreqTransport::new())),
            session: self.session,
            stub_policy: self.stub_policy,
            same_thread_stubs: self.same_thread_stubs,
            fixtures: self.fixtures,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::http::{HttpRequest, HttpResponse};

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
    }

    crate::json_model!(User);

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        clears: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: br#"{"user":{"id":1}}"#.to_vec(),
            })
        }

        fn clear_cache(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context(transport: Arc<CountingTransport>, policy: StubPolicy) -> NetworkContext {
        NetworkContext::builder(ServerConfiguration::new("api.example.com"))
            .transport(transport)
            .stub_policy(policy)
            .same_thread_stubs(true)
            .build()
    }

    #[test]
    fn policies() {
        let stub = StubHolder::from_string("{}");
        assert!(!StubPolicy::Never.should_stub("u", &stub));
        assert!(StubPolicy::Always.should_stub("u", &stub));
        let only_users = StubPolicy::matching(|url, _| url.ends_with("/users"));
        assert!(only_users.should_stub("https://h/api/v1/users", &stub));
        assert!(!only_users.should_stub("https://h/api/v1/items", &stub));
    }

    #[tokio::test]
    async fn stub_bypasses_transport() {
        let transport = Arc::new(CountingTransport::default());
        let ctx = context(Arc::clone(&transport), StubPolicy::Always);
        let call = Call::get("users/5").with_stub(StubHolder::from_string(r#"{"user":{"id":5}}"#));
        let user = ctx.fetch_model::<User>(&call).await.unwrap();
        assert_eq!(user, Some(User { id: 5 }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_status_stub_goes_live() {
        let transport = Arc::new(CountingTransport::default());
        let ctx = context(Arc::clone(&transport), StubPolicy::Always);
        let call = Call::get("users/1").with_stub(StubHolder::from_string("{}").with_status(404));
        let user = ctx.fetch_model::<User>(&call).await.unwrap();
        assert_eq!(user, Some(User { id: 1 }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncached_submit_clears_cache() {
        let transport = Arc::new(CountingTransport::default());
        let ctx = context(Arc::clone(&transport), StubPolicy::Never);
        ctx.fetch_model::<User>(&Call::get("users/1")).await.unwrap();
        ctx.fetch_model::<User>(&Call::get("users/1").with_cache(true)).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replace_transport_routes_to_new_one() {
        let first = Arc::new(CountingTransport::default());
        let second = Arc::new(CountingTransport::default());
        let mut ctx = context(Arc::clone(&first), StubPolicy::Never);
        ctx.replace_transport(second.clone());
        ctx.fetch_model::<User>(&Call::get("users/1")).await.unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    /// Answers every request with one fixed error response.
    struct ErrorTransport {
        content_type: &'static str,
        body: Vec<u8>,
    }

    #[async_trait]
    impl Transport for ErrorTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
            Ok(HttpResponse {
                status: 422,
                headers: vec![("Content-Type".into(), self.content_type.into())],
                body: self.body.clone(),
            })
        }
    }

    async fn error_body(content_type: &'static str, body: &[u8]) -> String {
        let transport = Arc::new(ErrorTransport {
            content_type,
            body: body.to_vec(),
        });
        let ctx = NetworkContext::builder(ServerConfiguration::new("api.example.com"))
            .transport(transport)
            .build();
        match ctx.fetch_model::<User>(&Call::get("users/1")).await.unwrap_err() {
            ApiError::Status { status: 422, body, .. } => body,
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_body_uses_declared_charset() {
        let body = error_body("text/plain; charset=iso-8859-1", b"se\xf1or").await;
        assert_eq!(body, "se\u{f1}or");
    }

    #[tokio::test]
    async fn undecodable_status_body_falls_back_to_lossy() {
        let body = error_body("text/plain; charset=koi8-r", b"bad \xff").await;
        assert_eq!(body, "bad \u{fffd}");
    }
}
