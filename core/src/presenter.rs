//! Turning request errors into user-facing copy.
//!
//! # Design
//! Classification and rendering are separate. `classify` sorts an error
//! into one `ErrorClass`; presenters map classes to a (title, text) pair
//! and hand it to a `Renderer` (toast or alert, supplied by the host UI) or
//! to the log. Login-specific presenters only swap the 401/403 copy in the
//! status table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::http::Headers;

pub const UNKNOWN_STATUS_TEXT: &str = "Unknown error.";

const OFFLINE_TEXT: &str = "It looks like you're offline. Please check your internet connection.";
const TIMEOUT_TEXT: &str =
    "Request timed out. Please check your internet connection; if this keeps occurring, please contact us.";

/// What kind of failure an error represents, for presentation purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Server answered >= 300 with a non-empty body.
    ServerStatus { status: u16, message: String },
    /// Server answered >= 300 with an empty body.
    ServerHeaders { status: u16, headers: Headers },
    /// No server response, but the error describes itself.
    ExplicitMessage(String),
    NoConnection,
    Timeout,
    /// No response and no description; only the failure kind is known.
    Unknown(String),
}

pub fn classify(err: &ApiError) -> ErrorClass {
    if let ApiError::Status { status, headers, body } = err {
        if *status > 299 {
            return if body.trim().is_empty() {
                ErrorClass::ServerHeaders {
                    status: *status,
                    headers: headers.clone(),
                }
            } else {
                ErrorClass::ServerStatus {
                    status: *status,
                    message: body.clone(),
                }
            };
        }
    }
    if let Some(message) = err.message() {
        return ErrorClass::ExplicitMessage(message);
    }
    match err {
        ApiError::NoConnection => ErrorClass::NoConnection,
        ApiError::Timeout => ErrorClass::Timeout,
        ApiError::Unknown { kind } => ErrorClass::Unknown(kind.clone()),
        other => ErrorClass::Unknown(other.to_string()),
    }
}

/// Title and text for an error that came without a server response.
pub fn no_response_messages(err: &ApiError) -> (String, String) {
    match classify(err) {
        ErrorClass::ExplicitMessage(message) => ("Error".into(), message),
        ErrorClass::NoConnection => ("Offline".into(), OFFLINE_TEXT.into()),
        ErrorClass::Timeout => ("Timeout".into(), TIMEOUT_TEXT.into()),
        ErrorClass::Unknown(kind) => ("Error".into(), format!("{kind} occurred.")),
        ErrorClass::ServerStatus { status, .. } | ErrorClass::ServerHeaders { status, .. } => {
            ("Error".into(), format!("Server responded with {status}."))
        }
    }
}

/// Copy used for rejected credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginCopy {
    Generic,
    Email,
    Username,
}

impl LoginCopy {
    pub fn text(&self) -> &'static str {
        match self {
            LoginCopy::Generic => "Please check that your credentials are valid and try again.",
            LoginCopy::Email => "Invalid email/password combination. Please try again.",
            LoginCopy::Username => "Invalid username/password combination. Please try again.",
        }
    }
}

/// Human-readable text per HTTP status.
#[derive(Debug, Clone)]
pub struct StatusMessages {
    table: HashMap<u16, String>,
}

impl Default for StatusMessages {
    fn default() -> Self {
        let table = [
            (400, "Bad request"),
            (401, "Unauthorized"),
            (402, "Payment required"),
            (403, "Forbidden"),
            (404, "Not found"),
            (405, "HTTP method not allowed"),
            (406, "Content type in Accept header is unavailable"),
            (408, "Request timed out"),
            (409, "Conflict in requested resource"),
            (410, "Resource is permanently unavailable"),
            (411, "Length required"),
            (412, "Precondition failed"),
            (413, "Payload too large"),
            (414, "URI too long"),
            (415, "Unsupported media type"),
            (416, "Range not satisfiable"),
            (417, "Expectation failed"),
            (418, "This server is, in fact, a teapot"),
            (420, "Error 420, dank dude"),
            (421, "Unauthorized"),
            (422, "Unable to process payload"),
            (429, "Too many requests"),
            (431, "Headers too large"),
            (451, "Unavailable for legal reasons"),
            (500, "Internal server error"),
            (501, "This functionality is not implemented"),
            (502, "Bad internet gateway"),
            (503, "Server currently unavailable"),
            (505, "HTTP version not supported"),
            (511, "Network authentication required"),
        ]
        .into_iter()
        .map(|(code, text)| (code, text.to_string()))
        .collect();
        Self { table }
    }
}

impl StatusMessages {
    /// Default table with 401/403 replaced by login copy.
    pub fn with_login_copy(copy: LoginCopy) -> Self {
        Self::default()
            .with_override(401, copy.text())
            .with_override(403, copy.text())
    }

    pub fn with_override(mut self, status: u16, text: &str) -> Self {
        self.table.insert(status, text.to_string());
        self
    }

    pub fn text(&self, status: u16) -> &str {
        self.table.get(&status).map_or(UNKNOWN_STATUS_TEXT, String::as_str)
    }

    /// `("Error {status}", text)`.
    pub fn strings(&self, status: u16) -> (String, String) {
        (format!("Error {status}"), self.text(status).to_string())
    }
}

/// UI surface the host provides for showing errors.
pub trait Renderer: Send + Sync {
    fn toast(&self, text: &str);
    fn alert(&self, title: &str, text: &str);
}

/// Renderer writing toasts and alerts to the log, for headless hosts.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn toast(&self, text: &str) {
        log::info!("{text}");
    }

    fn alert(&self, title: &str, text: &str) {
        log::warn!("{title}: {text}");
    }
}

pub trait ErrorPresenter {
    fn present(&self, err: &ApiError);
}

/// Writes error details to the log.
#[derive(Debug, Default)]
pub struct LoggingPresenter;

impl ErrorPresenter for LoggingPresenter {
    fn present(&self, err: &ApiError) {
        match err {
            ApiError::Status { status, headers, body } if *status > 299 => {
                log::error!("Status code: {status}");
                log::error!("Headers: {headers:?}");
                if !body.is_empty() {
                    log::error!("Message: {body}");
                }
            }
            other => log::error!("{other}"),
        }
    }
}

/// Developer-facing presenter showing raw status details.
pub struct DebugPresenter {
    renderer: Arc<dyn Renderer>,
    as_toast: bool,
}

impl DebugPresenter {
    pub fn alert(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer, as_toast: false }
    }

    pub fn toast(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer, as_toast: true }
    }

    pub fn messages(err: &ApiError) -> (String, String) {
        match classify(err) {
            ErrorClass::ServerStatus { status, message } => (format!("Server Error {status}"), format!("Message: {message}")),
            ErrorClass::ServerHeaders { status, headers } => (format!("Server Error {status}"), format!("Headers: {headers:?}")),
            _ => no_response_messages(err),
        }
    }
}

impl ErrorPresenter for DebugPresenter {
    fn present(&self, err: &ApiError) {
        let (title, text) = Self::messages(err);
        if !self.as_toast {
            self.renderer.alert(&title, &text);
        } else if err.status().is_some() {
            self.renderer.toast(&title);
        } else {
            self.renderer.toast(&text);
        }
    }
}

/// Where `ServerCodePresenter` shows its copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    Log,
    #[default]
    Toast,
    Alert,
}

/// User-facing presenter backed by the status table.
pub struct ServerCodePresenter {
    messages: StatusMessages,
    display: DisplayMode,
    renderer: Option<Arc<dyn Renderer>>,
}

impl ServerCodePresenter {
    pub fn new(renderer: Option<Arc<dyn Renderer>>, display: DisplayMode) -> Self {
        Self::with_messages(StatusMessages::default(), renderer, display)
    }

    pub fn with_messages(messages: StatusMessages, renderer: Option<Arc<dyn Renderer>>, display: DisplayMode) -> Self {
        Self {
            messages,
            display,
            renderer,
        }
    }

    pub fn login(copy: LoginCopy, renderer: Option<Arc<dyn Renderer>>, display: DisplayMode) -> Self {
        Self::with_messages(StatusMessages::with_login_copy(copy), renderer, display)
    }

    pub fn status_messages(&self) -> &StatusMessages {
        &self.messages
    }

    /// Title and text shown for `err`.
    pub fn error_strings(&self, err: &ApiError) -> (String, String) {
        match err.status() {
            Some(status) if status > 299 => self.messages.strings(status),
            _ => no_response_messages(err),
        }
    }
}

impl ErrorPresenter for ServerCodePresenter {
    fn present(&self, err: &ApiError) {
        let (title, text) = self.error_strings(err);
        match (self.display, &self.renderer) {
            (DisplayMode::Log, _) => LoggingPresenter.present(err),
            (DisplayMode::Toast, Some(renderer)) => renderer.toast(&format!("{title}: {text}")),
            (DisplayMode::Alert, Some(renderer)) => renderer.alert(&title, &text),
            (_, None) => log::debug!("no renderer for {title}: {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, Once};

    use super::*;

    /// Collects formatted log records so renderer output can be asserted.
    struct CapturingLogger {
        records: Mutex<Vec<String>>,
    }

    impl log::Log for CapturingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.records
                .lock()
                .unwrap()
                .push(format!("{}|{}", record.level(), record.args()));
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger {
        records: Mutex::new(Vec::new()),
    };

    fn captured_logs() -> &'static CapturingLogger {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });
        &LOGGER
    }

    #[derive(Default)]
    struct RecordingRenderer {
        shown: Mutex<Vec<String>>,
    }

    impl Renderer for RecordingRenderer {
        fn toast(&self, text: &str) {
            self.shown.lock().unwrap().push(format!("toast|{text}"));
        }

        fn alert(&self, title: &str, text: &str) {
            self.shown.lock().unwrap().push(format!("alert|{title}|{text}"));
        }
    }

    fn status(code: u16, body: &str) -> ApiError {
        ApiError::Status {
            status: code,
            headers: vec![("Server".into(), "mock".into())],
            body: body.to_string(),
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify(&ApiError::NoConnection), ErrorClass::NoConnection);
        assert_eq!(classify(&ApiError::Timeout), ErrorClass::Timeout);
        assert_eq!(classify(&ApiError::Unknown { kind: "Panicked".into() }), ErrorClass::Unknown("Panicked".into()));
        assert!(matches!(classify(&ApiError::Decode("x".into())), ErrorClass::ExplicitMessage(_)));
        assert!(matches!(classify(&status(500, "boom")), ErrorClass::ServerStatus { status: 500, .. }));
        assert!(matches!(classify(&status(404, "")), ErrorClass::ServerHeaders { status: 404, .. }));
    }

    #[test]
    fn offline_copy() {
        let (title, text) = no_response_messages(&ApiError::NoConnection);
        assert_eq!(title, "Offline");
        assert_eq!(text, OFFLINE_TEXT);
    }

    #[test]
    fn unknown_copy_names_the_kind() {
        let (title, text) = no_response_messages(&ApiError::Unknown { kind: "Cancelled".into() });
        assert_eq!(title, "Error");
        assert_eq!(text, "Cancelled occurred.");
    }

    #[test]
    fn status_table_lookup_and_fallback() {
        let presenter = ServerCodePresenter::new(None, DisplayMode::Toast);
        assert_eq!(presenter.error_strings(&status(404, "")), ("Error 404".to_string(), "Not found".to_string()));
        assert_eq!(presenter.error_strings(&status(599, "")).1, UNKNOWN_STATUS_TEXT);
        assert_eq!(presenter.error_strings(&ApiError::Timeout).0, "Timeout");
    }

    #[test]
    fn login_copy_overrides_only_401_and_403() {
        let messages = StatusMessages::with_login_copy(LoginCopy::Email);
        assert_eq!(messages.text(401), "Invalid email/password combination. Please try again.");
        assert_eq!(messages.text(403), LoginCopy::Email.text());
        assert_eq!(messages.text(404), "Not found");
        assert_eq!(StatusMessages::with_login_copy(LoginCopy::Username).text(401), LoginCopy::Username.text());
    }

    #[test]
    fn toast_mode_renders_title_and_text() {
        let renderer = Arc::new(RecordingRenderer::default());
        let presenter = ServerCodePresenter::new(Some(renderer.clone() as Arc<dyn Renderer>), DisplayMode::Toast);
        presenter.present(&status(503, ""));
        assert_eq!(*renderer.shown.lock().unwrap(), vec!["toast|Error 503: Server currently unavailable".to_string()]);
    }

    #[test]
    fn alert_mode_renders_dialog() {
        let renderer = Arc::new(RecordingRenderer::default());
        let presenter = ServerCodePresenter::login(LoginCopy::Generic, Some(renderer.clone() as Arc<dyn Renderer>), DisplayMode::Alert);
        presenter.present(&status(401, ""));
        assert_eq!(
            *renderer.shown.lock().unwrap(),
            vec![format!("alert|Error 401|{}", LoginCopy::Generic.text())]
        );
    }

    #[test]
    fn log_renderer_writes_toasts_and_alerts() {
        let logs = captured_logs();
        let renderer: Arc<dyn Renderer> = Arc::new(LogRenderer);

        ServerCodePresenter::new(Some(renderer.clone()), DisplayMode::Toast).present(&status(409, ""));
        ServerCodePresenter::new(Some(renderer), DisplayMode::Alert).present(&status(410, ""));

        let records = logs.records.lock().unwrap();
        assert!(records.contains(&"INFO|Error 409: Conflict in requested resource".to_string()), "{records:?}");
        assert!(records.contains(&"WARN|Error 410: Resource is permanently unavailable".to_string()), "{records:?}");
    }

    #[test]
    fn log_mode_never_touches_renderer() {
        let renderer = Arc::new(RecordingRenderer::default());
        let presenter = ServerCodePresenter::new(Some(renderer.clone() as Arc<dyn Renderer>), DisplayMode::Log);
        presenter.present(&status(500, "boom"));
        assert!(renderer.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_presenter_shows_message_or_headers() {
        assert_eq!(
            DebugPresenter::messages(&status(500, "boom")),
            ("Server Error 500".to_string(), "Message: boom".to_string())
        );
        let (_, text) = DebugPresenter::messages(&status(502, ""));
        assert!(text.starts_with("Headers: "));
    }

    #[test]
    fn debug_toast_uses_title_for_status_and_text_otherwise() {
        let renderer = Arc::new(RecordingRenderer::default());
        let presenter = DebugPresenter::toast(renderer.clone());
        presenter.present(&status(418, ""));
        presenter.present(&ApiError::NoConnection);
        let shown = renderer.shown.lock().unwrap();
        assert_eq!(shown[0], "toast|Server Error 418");
        assert_eq!(shown[1], format!("toast|{OFFLINE_TEXT}"));
    }
}
