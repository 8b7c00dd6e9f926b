//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values and decodes `HttpResponse` values; whatever
//! implements `Transport` performs the round-trip. Stubbed requests never
//! produce an `HttpRequest` at all.

use crate::error::ApiError;

/// Header list in insertion order. Names compare case-insensitively.
pub type Headers = Vec<(String, String)>;

/// Charset assumed when a response does not declare one.
pub const PROTOCOL_CHARSET: &str = "utf-8";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
    /// Whether the transport may answer from, and store into, its cache.
    pub should_cache: bool,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Look up a header value by case-insensitive name.
pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Insert or replace a header, keeping the position of an existing entry.
pub fn set_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    let value = value.into();
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// Charset declared by the `Content-Type` header, or `default`.
pub fn parse_charset(headers: &[(String, String)], default: &str) -> String {
    header(headers, "content-type")
        .and_then(|value| {
            value.split(';').skip(1).find_map(|param| {
                let (key, val) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| val.trim().trim_matches('"').to_ascii_lowercase())
            })
        })
        .unwrap_or_else(|| default.to_string())
}

/// Decode `bytes` as text in `charset`.
pub fn decode_text(bytes: &[u8], charset: &str) -> Result<String, ApiError> {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes.to_vec())
            .map_err(|e| ApiError::Decode(e.to_string())),
        "iso-8859-1" | "latin1" | "latin-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| b as char).collect())
            } else {
                Err(ApiError::Decode("non-ascii byte in us-ascii body".into()))
            }
        }
        other => Err(ApiError::Encoding(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_type(value: &str) -> Headers {
        vec![("Content-Type".to_string(), value.to_string())]
    }

    #[test]
    fn http_method_as_str() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }

    #[test]
    fn charset_defaults_when_absent() {
        assert_eq!(parse_charset(&content_type("application/json"), PROTOCOL_CHARSET), "utf-8");
        assert_eq!(parse_charset(&[], PROTOCOL_CHARSET), "utf-8");
    }

    #[test]
    fn charset_read_from_content_type() {
        let headers = content_type("application/json; charset=\"ISO-8859-1\"");
        assert_eq!(parse_charset(&headers, PROTOCOL_CHARSET), "iso-8859-1");
    }

    #[test]
    fn latin1_bytes_decode() {
        assert_eq!(decode_text(&[0x63, 0x61, 0x66, 0xe9], "iso-8859-1").unwrap(), "café");
    }

    #[test]
    fn unknown_charset_is_encoding_error() {
        let err = decode_text(b"{}", "koi8-r").unwrap_err();
        assert!(matches!(err, ApiError::Encoding(ref c) if c == "koi8-r"));
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let err = decode_text(&[0xff, 0xfe], "utf-8").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut headers = vec![("Accept".to_string(), "text/plain".to_string())];
        set_header(&mut headers, "accept", "application/json");
        set_header(&mut headers, "Authorization", "Bearer t");
        assert_eq!(headers.len(), 2);
        assert_eq!(header(&headers, "ACCEPT"), Some("application/json"));
        assert_eq!(headers[1].0, "Authorization");
    }
}
