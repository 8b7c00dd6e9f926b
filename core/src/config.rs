//! Server location and endpoint URL rendering.

use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_API_BASE_ROUTE: &str = "api/v1";

/// Where the API lives. Built once per environment and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawServerConfiguration")]
pub struct ServerConfiguration {
    scheme: String,
    host: String,
    api_base_route: String,
}

/// Deserialized form, normalized through the builder methods.
#[derive(Deserialize)]
struct RawServerConfiguration {
    #[serde(default = "default_scheme")]
    scheme: String,
    host: String,
    #[serde(default = "default_api_base_route")]
    api_base_route: String,
}

impl From<RawServerConfiguration> for ServerConfiguration {
    fn from(raw: RawServerConfiguration) -> Self {
        Self::new(&raw.host)
            .with_scheme(&raw.scheme)
            .with_api_base_route(&raw.api_base_route)
    }
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_api_base_route() -> String {
    DEFAULT_API_BASE_ROUTE.to_string()
}

impl ServerConfiguration {
    pub fn new(host: &str) -> Self {
        Self {
            scheme: default_scheme(),
            host: host.trim_end_matches('/').to_string(),
            api_base_route: default_api_base_route(),
        }
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn with_api_base_route(mut self, route: &str) -> Self {
        self.api_base_route = route.trim_matches('/').to_string();
        self
    }

    /// Read `NETCALLS_HOST` plus the optional `NETCALLS_SCHEME` and
    /// `NETCALLS_API_BASE_ROUTE` from the environment.
    pub fn from_env() -> Result<Self, ApiError> {
        let host = std::env::var("NETCALLS_HOST")
            .map_err(|_| ApiError::Config("NETCALLS_HOST is not set".into()))?;
        let mut config = Self::new(&host);
        if let Ok(scheme) = std::env::var("NETCALLS_SCHEME") {
            config = config.with_scheme(&scheme);
        }
        if let Ok(route) = std::env::var("NETCALLS_API_BASE_ROUTE") {
            config = config.with_api_base_route(&route);
        }
        Ok(config)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api_base_route(&self) -> &str {
        &self.api_base_route
    }

    pub fn url_for_endpoint(&self, endpoint: &str) -> String {
        format!("{}://{}/{}/{}", self.scheme, self.host, self.api_base_route, endpoint)
    }
}
