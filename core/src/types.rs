//! Backend enumerations and request DTOs.
//!
//! # Design
//! The callback enumerations are not serialized by derive. Each carries an
//! explicit `as_wire()` table because the backend wants strings for some
//! fields and integers for others, and the table is the single place that
//! decides which.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a callback delivers its events. Sent as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackChannel {
    Url,
    BatchUrl,
    Email,
}

impl CallbackChannel {
    pub fn as_wire(&self) -> &'static str {
        match self {
            CallbackChannel::Url => "URL",
            CallbackChannel::BatchUrl => "BATCH_URL",
            CallbackChannel::Email => "EMAIL",
        }
    }
}

/// HTTP method the backend uses when firing a callback. Sent as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackHttpMethod {
    Get,
    Put,
    Post,
}

impl CallbackHttpMethod {
    pub fn as_wire(&self) -> &'static str {
        match self {
            CallbackHttpMethod::Get => "GET",
            CallbackHttpMethod::Put => "PUT",
            CallbackHttpMethod::Post => "POST",
        }
    }

    /// POST and PUT callbacks carry a body template and content type.
    pub fn has_body(&self) -> bool {
        matches!(self, CallbackHttpMethod::Put | CallbackHttpMethod::Post)
    }
}

/// Class of event a callback fires on. Sent as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackType {
    Data,
    Service,
    Error,
}

impl CallbackType {
    pub fn as_wire(&self) -> u8 {
        match self {
            CallbackType::Data => 0,
            CallbackType::Service => 1,
            CallbackType::Error => 2,
        }
    }
}

/// Refinement of [`CallbackType`]. Sent as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSubtype {
    Status,
    GeoLocation,
    Uplink,
    Bidirectional,
    Acknowledge,
    Repeater,
    DataAdvanced,
}

impl CallbackSubtype {
    pub fn as_wire(&self) -> u8 {
        match self {
            CallbackSubtype::Status => 0,
            CallbackSubtype::GeoLocation => 1,
            CallbackSubtype::Uplink => 2,
            CallbackSubtype::Bidirectional => 3,
            CallbackSubtype::Acknowledge => 4,
            CallbackSubtype::Repeater => 5,
            CallbackSubtype::DataAdvanced => 6,
        }
    }
}

impl From<CallbackChannel> for Value {
    fn from(channel: CallbackChannel) -> Self {
        Value::from(channel.as_wire())
    }
}

impl From<CallbackHttpMethod> for Value {
    fn from(method: CallbackHttpMethod) -> Self {
        Value::from(method.as_wire())
    }
}

impl From<CallbackType> for Value {
    fn from(callback_type: CallbackType) -> Self {
        Value::from(callback_type.as_wire())
    }
}

impl From<CallbackSubtype> for Value {
    fn from(subtype: CallbackSubtype) -> Self {
        Value::from(subtype.as_wire())
    }
}

/// Headers the backend adds when firing a callback.
pub type CallbackHeaders = BTreeMap<String, String>;

pub(crate) fn headers_value(headers: CallbackHeaders) -> Value {
    Value::Object(
        headers
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect(),
    )
}

/// Settings for a new device-type callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackConfig {
    pub channel: CallbackChannel,
    pub callback_type: CallbackType,
    pub callback_subtype: CallbackSubtype,
    pub enabled: bool,
    pub url: String,
    pub http_method: CallbackHttpMethod,
    pub headers: Option<CallbackHeaders>,
    pub body_template: Option<String>,
    pub content_type: Option<String>,
}

impl CallbackConfig {
    pub fn new(
        channel: CallbackChannel,
        callback_type: CallbackType,
        callback_subtype: CallbackSubtype,
        url: impl Into<String>,
        http_method: CallbackHttpMethod,
    ) -> Self {
        Self {
            channel,
            callback_type,
            callback_subtype,
            enabled: true,
            url: url.into(),
            http_method,
            headers: None,
            body_template: None,
            content_type: None,
        }
    }
}

/// Partial update of an existing callback; `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackUpdate {
    pub channel: Option<CallbackChannel>,
    pub callback_type: Option<CallbackType>,
    pub callback_subtype: Option<CallbackSubtype>,
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub http_method: Option<CallbackHttpMethod>,
    pub headers: Option<CallbackHeaders>,
    pub body_template: Option<String>,
    pub content_type: Option<String>,
}

/// One entry of a bulk device creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub id: String,
    pub pac: String,
    pub name: String,
}

/// One entry of a bulk device update. Only the fields present are applied;
/// a NaN or infinite coordinate is not sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "no_coordinate")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "no_coordinate")]
    pub lng: Option<f64>,
}

fn no_coordinate(value: &Option<f64>) -> bool {
    !value.is_some_and(f64::is_finite)
}

/// One entry of a bulk device transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDevice {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activable: Option<bool>,
}

impl TransferDevice {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keep_history: None,
            activable: None,
        }
    }
}

/// Copy `devices`, forcing `keep_history` and/or `activable` to `true` on
/// every entry when the matching flag is set.
///
/// A `false` flag leaves the per-entry values as supplied; there is no way
/// to force them all to `false`.
pub fn apply_transfer_flags(
    devices: &[TransferDevice],
    keep_history_for_all: bool,
    activable_for_all: bool,
) -> Vec<TransferDevice> {
    devices
        .iter()
        .cloned()
        .map(|mut device| {
            if keep_history_for_all {
                device.keep_history = Some(true);
            }
            if activable_for_all {
                device.activable = Some(true);
            }
            device
        })
        .collect()
}
