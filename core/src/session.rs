//! Session collaborator consulted by authenticated calls.

use crate::http::{set_header, Headers};

/// Supplies the auth headers of the signed-in user.
pub trait Session: Send + Sync {
    fn add_auth_headers(&self, headers: Headers) -> Headers;
}

/// Session authenticating with `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerSession {
    token: String,
}

impl BearerSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Session for BearerSession {
    fn add_auth_headers(&self, mut headers: Headers) -> Headers {
        set_header(&mut headers, "Authorization", format!("Bearer {}", self.token));
        headers
    }
}
