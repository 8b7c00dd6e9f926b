//! Call configuration assembled into ready-to-fire requests.
//!
//! # Design
//! A single `Call` struct covers plain, authenticated, URL-parametered,
//! paged and index calls through named fields. `build_request` runs one
//! fixed pipeline: endpoint -> server URL -> query params (page key last);
//! auth is applied on the header side only. URLs are rendered on every
//! build, so changing `page` between builds is always reflected.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::ServerConfiguration;
use crate::error::ApiError;
use crate::http::{Headers, HttpMethod};
use crate::request::{HeaderTransform, JsonRequest, ResponseParser};
use crate::session::Session;
use crate::stub::StubHolder;

pub const DEFAULT_PAGE_KEY: &str = "page";

/// How query parameter values are written into the URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamEncoding {
    /// `key=value` verbatim, as existing servers expect.
    #[default]
    Raw,
    /// `application/x-www-form-urlencoded` escaping of keys and values.
    Percent,
}

/// Page counter bound to one reserved query key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paging {
    pub key: String,
    pub page: u32,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: HttpMethod,
    pub endpoint: String,
    pub body: Option<String>,
    /// Ask the session for auth headers when one is present.
    pub authenticated: bool,
    pub params: Vec<(String, String)>,
    pub paging: Option<Paging>,
    pub encoding: ParamEncoding,
    pub should_cache: bool,
    pub stub: Option<StubHolder>,
}

impl Call {
    /// Plain call without auth or params.
    pub fn new(method: HttpMethod, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            body: None,
            authenticated: false,
            params: Vec::new(),
            paging: None,
            encoding: ParamEncoding::Raw,
            should_cache: false,
            stub: None,
        }
    }

    pub fn get(endpoint: &str) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: &str, body: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint).with_body(body)
    }

    pub fn authenticated(method: HttpMethod, endpoint: &str) -> Self {
        Self {
            authenticated: true,
            ..Self::new(method, endpoint)
        }
    }

    /// Authenticated GET of a list.
    pub fn index(endpoint: &str) -> Self {
        Self::authenticated(HttpMethod::Get, endpoint)
    }

    /// Authenticated GET with a page counter under `page`.
    pub fn paged(endpoint: &str, page: u32) -> Self {
        Self {
            paging: Some(Paging {
                key: DEFAULT_PAGE_KEY.to_string(),
                page,
            }),
            ..Self::index(endpoint)
        }
    }

    /// Paged list fetch; same shape as `paged`, decoded with a list parser.
    pub fn paged_index(endpoint: &str, page: u32) -> Self {
        Self::paged(endpoint, page)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a query parameter, replacing an earlier value for the same key.
    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn set_param(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn with_page_key(mut self, key: &str) -> Self {
        let page = self.page().unwrap_or(0);
        self.paging = Some(Paging {
            key: key.to_string(),
            page,
        });
        self
    }

    pub fn with_encoding(mut self, encoding: ParamEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = should_cache;
        self
    }

    pub fn with_stub(mut self, stub: StubHolder) -> Self {
        self.stub = Some(stub);
        self
    }

    pub fn page(&self) -> Option<u32> {
        self.paging.as_ref().map(|p| p.page)
    }

    pub fn set_page(&mut self, page: u32) {
        match self.paging.as_mut() {
            Some(paging) => paging.page = page,
            None => {
                self.paging = Some(Paging {
                    key: DEFAULT_PAGE_KEY.to_string(),
                    page,
                })
            }
        }
    }

    /// Advance to the next page and return it.
    pub fn next_page(&mut self) -> u32 {
        let next = self.page().map_or(0, |p| p + 1);
        self.set_page(next);
        next
    }

    /// Parameters in the order they are written, page key last.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = match &self.paging {
            Some(paging) => self.params.iter().filter(|(k, _)| *k != paging.key).cloned().collect(),
            None => self.params.clone(),
        };
        if let Some(paging) = &self.paging {
            params.push((paging.key.clone(), paging.page.to_string()));
        }
        params
    }

    /// Absolute URL including the query string.
    pub fn url(&self, server: &ServerConfiguration) -> String {
        let base = server.url_for_endpoint(&self.endpoint);
        let params = self.query_params();
        if params.is_empty() {
            return base;
        }
        format!("{base}?{}", params_string(&params, self.encoding))
    }

    /// Header transform for this call given the current session.
    pub fn header_transform(&self, session: Option<&Arc<dyn Session>>) -> HeaderTransform {
        match (self.authenticated, session) {
            (true, Some(session)) => {
                let session = Arc::clone(session);
                Arc::new(move |headers: Headers| session.add_auth_headers(headers))
            }
            _ => Arc::new(|headers: Headers| headers),
        }
    }

    pub fn build_request<T>(
        &self,
        server: &ServerConfiguration,
        session: Option<&Arc<dyn Session>>,
        parser: ResponseParser<T>,
    ) -> JsonRequest<T> {
        let mut request = JsonRequest::new(self.method, self.url(server), parser)
            .with_header_transform(self.header_transform(session));
        if let Some(body) = &self.body {
            request = request.with_body(body.clone());
        }
        if let Some(stub) = &self.stub {
            request = request.with_stub(stub.clone());
        }
        request
    }
}

/// `k1=v1&k2=v2`.
pub fn params_string(params: &[(String, String)], encoding: ParamEncoding) -> String {
    params
        .iter()
        .map(|(k, v)| match encoding {
            ParamEncoding::Raw => format!("{k}={v}"),
            ParamEncoding::Percent => format!("{}={}", form_encode(k), form_encode(v)),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn form_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// POST of username/password credentials, optionally wrapped.
#[derive(Debug, Clone)]
pub struct CredsLoginCall {
    pub endpoint: String,
    pub wrap_key: Option<String>,
    pub username_key: String,
    pub password_key: String,
    pub username: String,
    pub password: String,
    pub stub: Option<StubHolder>,
}

impl Default for CredsLoginCall {
    fn default() -> Self {
        Self {
            endpoint: "sessions".to_string(),
            wrap_key: Some("user".to_string()),
            username_key: "username".to_string(),
            password_key: "password".to_string(),
            username: String::new(),
            password: String::new(),
            stub: None,
        }
    }
}

impl CredsLoginCall {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_wrap_key(mut self, wrap_key: Option<&str>) -> Self {
        self.wrap_key = wrap_key.map(str::to_string);
        self
    }

    pub fn with_keys(mut self, username_key: &str, password_key: &str) -> Self {
        self.username_key = username_key.to_string();
        self.password_key = password_key.to_string();
        self
    }

    pub fn with_stub(mut self, stub: StubHolder) -> Self {
        self.stub = Some(stub);
        self
    }

    pub fn body(&self) -> Result<String, ApiError> {
        let mut creds = Map::new();
        creds.insert(self.username_key.clone(), Value::String(self.username.clone()));
        creds.insert(self.password_key.clone(), Value::String(self.password.clone()));
        let body = match &self.wrap_key {
            Some(wrap) => {
                let mut wrapper = Map::new();
                wrapper.insert(wrap.clone(), Value::Object(creds));
                Value::Object(wrapper)
            }
            None => Value::Object(creds),
        };
        serde_json::to_string(&body).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// The POST call carrying the current credentials.
    pub fn to_call(&self) -> Result<Call, ApiError> {
        let mut call = Call::post(&self.endpoint, self.body()?);
        call.stub = self.stub.clone();
        Ok(call)
    }
}
