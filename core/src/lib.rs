//! Blocking client for the Sigfox v2 REST API.
//!
//! # Overview
//! Each operation expands a path template, attaches Basic authentication,
//! serializes a JSON body for writes, performs one blocking round trip and
//! returns the HTTP status together with the decoded body. Status codes are
//! never interpreted: `(404, None)` is a result, not an error.
//!
//! # Design
//! - `SigfoxClient` holds only the base URL, credentials and a transport.
//! - Every endpoint has a pure `build_*` method producing an `HttpRequest`,
//!   so request construction is testable without a network.
//! - `Transport` is the I/O seam; `UreqTransport` is the blocking default.
//! - Optional arguments are `Option<T>` and are left out of the body when
//!   `None`, never sent as `null`.

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod payload;
pub mod response;
pub mod types;
pub mod url;

pub use auth::Credentials;
pub use client::SigfoxClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use payload::Payload;
pub use response::ApiResponse;
pub use types::{
    apply_transfer_flags, CallbackChannel, CallbackConfig, CallbackHeaders, CallbackHttpMethod,
    CallbackSubtype, CallbackType, CallbackUpdate, DeviceUpdate, NewDevice, TransferDevice,
};
pub use url::{build_url, DEFAULT_BASE_URL};
