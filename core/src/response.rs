//! The `(status, data)` pair returned by every client operation.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;

/// Status code and decoded body of one backend response.
///
/// The client does not interpret `status`; a 404 is as valid a result as a
/// 200.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` when the backend answered with an empty body.
    pub data: Option<Value>,
}

impl ApiResponse {
    /// Decode a raw response. Only a zero-length body counts as empty.
    pub fn from_http(response: HttpResponse) -> Result<Self, ApiError> {
        let data = if response.body.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&response.body).map_err(ApiError::Deserialization)?)
        };
        Ok(Self {
            status: response.status,
            data,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_parts(self) -> (u16, Option<Value>) {
        (self.status, self.data)
    }
}
