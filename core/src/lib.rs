//! Typed JSON network calls with stubbing and error presentation.
//!
//! # Overview
//! A `Call` describes intent (endpoint, params, page, auth, body). It is
//! built into a `JsonRequest<T>` against a `ServerConfiguration`, and
//! `NetworkContext::submit` either feeds an attached stub through the
//! request's parser or executes it on a `Transport`. Failures come back as
//! `ApiError`, which the `presenter` module turns into user-facing copy.
//!
//! # Design
//! - No process-wide state: the transport, session and stub knobs live in a
//!   `NetworkContext` the caller owns and passes around.
//! - Requests are plain data at the transport boundary (`HttpRequest`,
//!   `HttpResponse`), so tests can swap the live transport for a fake.
//! - Models declare their JSON key through `JsonModel` instead of relying
//!   on runtime type names.

pub mod call;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod presenter;
pub mod queue;
pub mod request;
pub mod session;
pub mod stub;
pub mod transport;

pub use call::{Call, CredsLoginCall, ParamEncoding, Paging};
pub use codec::{decode_list, decode_single, model_key_for, plural_key_for, JsonModel};
pub use config::ServerConfiguration;
pub use error::ApiError;
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use presenter::{classify, DisplayMode, ErrorClass, ErrorPresenter, LoginCopy, ServerCodePresenter, StatusMessages};
pub use queue::{NetworkContext, NetworkContextBuilder, StubPolicy};
pub use request::{JsonRequest, ResponseParser};
pub use session::{BearerSession, Session};
pub use stub::{FixtureStore, StubHolder};
pub use transport::{Transport, UreqTransport};
