//! Typed request bridging a call to the transport.
//!
//! # Design
//! A `JsonRequest<T>` carries everything needed to fire one call: method,
//! URL, body, a header transform, the parser turning response text into
//! `T`, and an optional stub. There are no stored listeners; the caller
//! awaits `NetworkContext::submit`, which consumes the request, so a
//! request can only ever be fired once.

use std::fmt;
use std::sync::Arc;

use crate::error::ApiError;
use crate::http::{decode_text, parse_charset, set_header, Headers, HttpMethod, HttpRequest, PROTOCOL_CHARSET};
use crate::stub::StubHolder;

/// Turns response text into an optional model.
pub type ResponseParser<T> = Arc<dyn Fn(&str) -> Result<Option<T>, ApiError> + Send + Sync>;

/// Rewrites the outgoing headers, e.g. to add auth.
pub type HeaderTransform = Arc<dyn Fn(Headers) -> Headers + Send + Sync>;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub struct JsonRequest<T> {
    method: HttpMethod,
    url: String,
    body: Option<String>,
    header_transform: HeaderTransform,
    parser: ResponseParser<T>,
    stub: Option<StubHolder>,
}

impl<T> JsonRequest<T> {
    pub fn new(method: HttpMethod, url: impl Into<String>, parser: ResponseParser<T>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            header_transform: Arc::new(|headers: Headers| headers),
            parser,
            stub: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header_transform(mut self, transform: HeaderTransform) -> Self {
        self.header_transform = transform;
        self
    }

    pub fn with_stub(mut self, stub: StubHolder) -> Self {
        self.stub = Some(stub);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn stub(&self) -> Option<&StubHolder> {
        self.stub.as_ref()
    }

    pub(crate) fn parser(&self) -> ResponseParser<T> {
        Arc::clone(&self.parser)
    }

    /// Run the response parser over already-decoded text.
    pub fn parse_text(&self, text: &str) -> Result<Option<T>, ApiError> {
        (self.parser)(text)
    }

    /// Transport defaults with the header transform applied on top.
    pub fn headers_for_request(&self, defaults: Headers) -> Headers {
        (self.header_transform)(defaults)
    }

    /// Decode a raw response body with its declared charset and parse it.
    pub fn build_network_response(&self, raw: &[u8], headers: &[(String, String)]) -> Result<Option<T>, ApiError> {
        let charset = parse_charset(headers, PROTOCOL_CHARSET);
        let text = decode_text(raw, &charset)?;
        let parsed = self.parse_text(&text);
        log::trace!("parsed response for {} {}: ok={}", self.method.as_str(), self.url, parsed.is_ok());
        parsed
    }

    /// Plain-data request for the transport.
    pub fn to_http_request(&self, mut defaults: Headers, should_cache: bool) -> HttpRequest {
        if self.body.is_some() {
            set_header(&mut defaults, "Content-Type", JSON_CONTENT_TYPE);
        }
        HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers_for_request(defaults),
            body: self.body.clone(),
            should_cache,
        }
    }
}

impl<T> fmt::Debug for JsonRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body)
            .field("stub", &self.stub)
            .finish_non_exhaustive()
    }
}
