//! Request builders and blocking operations for the Sigfox v2 API.
//!
//! # Design
//! `SigfoxClient` holds a base URL, the credentials and a transport, and
//! carries no mutable state between calls. Every endpoint is split into a
//! `build_*` method that produces an `HttpRequest` without touching the
//! network, and an operation of the same name that sends it through the
//! transport and returns the decoded `ApiResponse` verbatim.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport, UreqTransport};
use crate::payload::Payload;
use crate::response::ApiResponse;
use crate::types::{
    apply_transfer_flags, headers_value, CallbackConfig, CallbackHttpMethod, CallbackUpdate,
    DeviceUpdate, NewDevice, TransferDevice,
};
use crate::url::{build_url, UrlArgs, DEFAULT_BASE_URL};

/// Blocking client for the device, device-type, callback and contract
/// endpoints.
#[derive(Debug, Clone)]
pub struct SigfoxClient<T = UreqTransport> {
    base_url: String,
    credentials: Credentials,
    transport: T,
}

impl SigfoxClient<UreqTransport> {
    /// Client for [`DEFAULT_BASE_URL`] over a default `ureq` agent.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_transport(credentials, UreqTransport::new())
    }
}

impl<T> SigfoxClient<T> {
    pub fn with_transport(credentials: Credentials, transport: T) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
            transport,
        }
    }

    /// Point the client at another backend, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials attached to every request.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn url(&self, template: &str, args: &UrlArgs<'_>) -> Result<String, ApiError> {
        build_url(&self.base_url, template, args)
    }

    fn get_request(&self, path: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path,
            headers: vec![("authorization".to_string(), self.credentials.basic_auth_header())],
            body: None,
        }
    }

    fn json_request(&self, method: HttpMethod, path: String, payload: Value) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(&payload).map_err(ApiError::Serialization)?;
        Ok(HttpRequest {
            method,
            path,
            headers: vec![
                ("authorization".to_string(), self.credentials.basic_auth_header()),
                ("content-type".to_string(), "application/json".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    pub fn build_get_device(&self, device_id: &str) -> Result<HttpRequest, ApiError> {
        let url = self.url("/devices/{deviceid}", &[("deviceid", &device_id)])?;
        Ok(self.get_request(url))
    }

    pub fn build_get_devices(&self, device_type_id: &str) -> Result<HttpRequest, ApiError> {
        let url = self.url("/devices?deviceTypeId={sfid}", &[("sfid", &device_type_id)])?;
        Ok(self.get_request(url))
    }

    /// `since` is a timestamp in milliseconds since the Unix epoch.
    pub fn build_get_device_messages(&self, device_id: &str, since: Option<u64>) -> Result<HttpRequest, ApiError> {
        let url = match since {
            Some(timestamp) => self.url(
                "/devices/{sfid}/messages?since={timestamp}",
                &[("sfid", &device_id), ("timestamp", &timestamp)],
            )?,
            None => self.url("/devices/{sfid}/messages", &[("sfid", &device_id)])?,
        };
        Ok(self.get_request(url))
    }

    pub fn build_create_device(
        &self,
        id: &str,
        name: &str,
        device_type_id: &str,
        pac: &str,
    ) -> Result<HttpRequest, ApiError> {
        let payload = Payload::new()
            .with("id", id)
            .with("name", name)
            .with("deviceTypeId", device_type_id)
            .with("pac", pac);
        self.json_request(HttpMethod::Post, self.url("/devices", &[])?, payload.into_value())
    }

    pub fn build_bulk_create_devices(
        &self,
        device_type_id: &str,
        devices: &[NewDevice],
    ) -> Result<HttpRequest, ApiError> {
        let payload = Payload::new()
            .with("deviceTypeId", device_type_id)
            .with("data", to_value(devices)?);
        self.json_request(HttpMethod::Post, self.url("/devices/bulk", &[])?, payload.into_value())
    }

    /// `certificate` is the product certificate key. A non-finite `lat` or
    /// `lng` has no JSON form and is left out like `None`.
    pub fn build_update_device(
        &self,
        id: &str,
        name: Option<&str>,
        lat: Option<f64>,
        lng: Option<f64>,
        certificate: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let payload = Payload::new()
            .with_optional("name", name)
            .with_optional("lat", lat.filter(|v| v.is_finite()))
            .with_optional("lng", lng.filter(|v| v.is_finite()))
            .with_optional(
                "productCertificate",
                certificate.map(|key| Payload::new().with("key", key)),
            );
        let url = self.url("/devices/{sfid}", &[("sfid", &id)])?;
        self.json_request(HttpMethod::Put, url, payload.into_value())
    }

    pub fn build_bulk_update_devices(&self, devices: &[DeviceUpdate]) -> Result<HttpRequest, ApiError> {
        let payload = Payload::new().with("data", to_value(devices)?);
        self.json_request(HttpMethod::Put, self.url("/devices/bulk", &[])?, payload.into_value())
    }

    /// Single-device form of [`SigfoxClient::build_bulk_transfer_devices`].
    ///
    /// The entry carries `keep_history` and `activable` explicitly, so `false`
    /// reaches the backend instead of being left to its default.
    pub fn build_transfer_device(
        &self,
        new_device_type_id: &str,
        device_id: &str,
        keep_history: bool,
        activable: bool,
    ) -> Result<HttpRequest, ApiError> {
        let device = TransferDevice {
            id: device_id.to_string(),
            keep_history: Some(keep_history),
            activable: Some(activable),
        };
        self.build_bulk_transfer_devices(new_device_type_id, &[device], keep_history, activable)
    }

    /// A `true` flag overrides the matching field on every entry.
    pub fn build_bulk_transfer_devices(
        &self,
        new_device_type_id: &str,
        devices: &[TransferDevice],
        keep_history_for_all: bool,
        activable_for_all: bool,
    ) -> Result<HttpRequest, ApiError> {
        let devices = apply_transfer_flags(devices, keep_history_for_all, activable_for_all);
        let payload = Payload::new()
            .with("deviceTypeId", new_device_type_id)
            .with("data", to_value(&devices)?);
        self.json_request(HttpMethod::Post, self.url("/devices/bulk/transfer", &[])?, payload.into_value())
    }

    // -----------------------------------------------------------------------
    // Device types and callbacks
    // -----------------------------------------------------------------------

    pub fn build_get_device_types(&self) -> Result<HttpRequest, ApiError> {
        Ok(self.get_request(self.url("/device-types", &[])?))
    }

    /// `name` filters on device type names containing the value.
    pub fn build_get_device_type_list(&self, name: Option<&str>) -> Result<HttpRequest, ApiError> {
        let url = match name {
            Some(name) => self.url("/device-types?name={name}", &[("name", &name)])?,
            None => self.url("/device-types", &[])?,
        };
        Ok(self.get_request(url))
    }

    /// The payload has no `id` field; the backend assigns the identifier and
    /// returns it in the response body.
    pub fn build_create_device_type(
        &self,
        name: &str,
        group_id: &str,
        contracts: &[&str],
        geoloc_payload_config_id: &str,
        description: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let payload = Payload::new()
            .with("name", name)
            .with("group_id", group_id)
            .with("contracts", contracts.to_vec())
            .with("geoloc_payload_config_id", geoloc_payload_config_id)
            .with_optional("description", description);
        self.json_request(HttpMethod::Post, self.url("/device-types", &[])?, payload.into_value())
    }

    pub fn build_get_device_type_callbacks(&self, device_type_id: &str) -> Result<HttpRequest, ApiError> {
        let url = self.url("/device-types/{sfid}/callbacks", &[("sfid", &device_type_id)])?;
        Ok(self.get_request(url))
    }

    pub fn build_create_device_type_callback(
        &self,
        device_type_id: &str,
        callback: &CallbackConfig,
    ) -> Result<HttpRequest, ApiError> {
        let mut payload = Payload::new()
            .with("channel", callback.channel)
            .with("callbackType", callback.callback_type)
            .with("callbackSubtype", callback.callback_subtype)
            .with("is_enabled", callback.enabled)
            .with("url", callback.url.as_str())
            .with("http_method", callback.http_method)
            .with_optional("headers", callback.headers.clone().map(headers_value));
        add_callback_body(
            &mut payload,
            Some(callback.http_method),
            callback.body_template.as_deref(),
            callback.content_type.as_deref(),
        );
        let url = self.url("/device_types/{id}/callbacks", &[("id", &device_type_id)])?;
        self.json_request(HttpMethod::Post, url, payload.into_value())
    }

    pub fn build_update_device_type_callback(
        &self,
        device_type_id: &str,
        callback_id: &str,
        update: &CallbackUpdate,
    ) -> Result<HttpRequest, ApiError> {
        let mut payload = Payload::new()
            .with_optional("channel", update.channel)
            .with_optional("callbackType", update.callback_type)
            .with_optional("callbackSubtype", update.callback_subtype)
            .with_optional("is_enabled", update.enabled)
            .with_optional("url", update.url.as_deref())
            .with_optional("http_method", update.http_method)
            .with_optional("headers", update.headers.clone().map(headers_value));
        add_callback_body(
            &mut payload,
            update.http_method,
            update.body_template.as_deref(),
            update.content_type.as_deref(),
        );
        let url = self.url(
            "/device_types/{id}/callbacks/{callbackId}",
            &[("id", &device_type_id), ("callbackId", &callback_id)],
        )?;
        self.json_request(HttpMethod::Put, url, payload.into_value())
    }

    // -----------------------------------------------------------------------
    // Contracts
    // -----------------------------------------------------------------------

    pub fn build_get_contract_information(&self) -> Result<HttpRequest, ApiError> {
        Ok(self.get_request(self.url("/contract-infos", &[])?))
    }
}

impl<T: Transport> SigfoxClient<T> {
    fn send(&self, request: HttpRequest) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, url = %request.path, "sending request");
        let response = self.transport.execute(request)?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        ApiResponse::from_http(response)
    }

    pub fn get_device(&self, device_id: &str) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_device(device_id)?)
    }

    pub fn get_devices(&self, device_type_id: &str) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_devices(device_type_id)?)
    }

    pub fn get_device_messages(&self, device_id: &str, since: Option<u64>) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_device_messages(device_id, since)?)
    }

    pub fn create_device(
        &self,
        id: &str,
        name: &str,
        device_type_id: &str,
        pac: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_create_device(id, name, device_type_id, pac)?)
    }

    /// Starts an asynchronous job; the response carries its `jobId`.
    pub fn bulk_create_devices(&self, device_type_id: &str, devices: &[NewDevice]) -> Result<ApiResponse, ApiError> {
        self.send(self.build_bulk_create_devices(device_type_id, devices)?)
    }

    pub fn update_device(
        &self,
        id: &str,
        name: Option<&str>,
        lat: Option<f64>,
        lng: Option<f64>,
        certificate: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_update_device(id, name, lat, lng, certificate)?)
    }

    pub fn bulk_update_devices(&self, devices: &[DeviceUpdate]) -> Result<ApiResponse, ApiError> {
        self.send(self.build_bulk_update_devices(devices)?)
    }

    pub fn transfer_device(
        &self,
        new_device_type_id: &str,
        device_id: &str,
        keep_history: bool,
        activable: bool,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_transfer_device(new_device_type_id, device_id, keep_history, activable)?)
    }

    pub fn bulk_transfer_devices(
        &self,
        new_device_type_id: &str,
        devices: &[TransferDevice],
        keep_history_for_all: bool,
        activable_for_all: bool,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_bulk_transfer_devices(
            new_device_type_id,
            devices,
            keep_history_for_all,
            activable_for_all,
        )?)
    }

    pub fn get_device_types(&self) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_device_types()?)
    }

    pub fn get_device_type_list(&self, name: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_device_type_list(name)?)
    }

    pub fn create_device_type(
        &self,
        name: &str,
        group_id: &str,
        contracts: &[&str],
        geoloc_payload_config_id: &str,
        description: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_create_device_type(name, group_id, contracts, geoloc_payload_config_id, description)?)
    }

    pub fn get_device_type_callbacks(&self, device_type_id: &str) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_device_type_callbacks(device_type_id)?)
    }

    pub fn create_device_type_callback(
        &self,
        device_type_id: &str,
        callback: &CallbackConfig,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_create_device_type_callback(device_type_id, callback)?)
    }

    pub fn update_device_type_callback(
        &self,
        device_type_id: &str,
        callback_id: &str,
        update: &CallbackUpdate,
    ) -> Result<ApiResponse, ApiError> {
        self.send(self.build_update_device_type_callback(device_type_id, callback_id, update)?)
    }

    pub fn get_contract_information(&self) -> Result<ApiResponse, ApiError> {
        self.send(self.build_get_contract_information()?)
    }
}

fn to_value<S: Serialize + ?Sized>(value: &S) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(ApiError::Serialization)
}

/// POST and PUT callbacks get `bodyTemplate` and `contentType`, but only when
/// both were supplied. Anything less is sent without either field.
fn add_callback_body(
    payload: &mut Payload,
    http_method: Option<CallbackHttpMethod>,
    body_template: Option<&str>,
    content_type: Option<&str>,
) {
    let Some(method) = http_method.filter(CallbackHttpMethod::has_body) else {
        return;
    };
    match (body_template, content_type) {
        (Some(body_template), Some(content_type)) => {
            payload
                .insert("bodyTemplate", body_template)
                .insert("contentType", content_type);
        }
        _ => warn!(
            http_method = method.as_wire(),
            "callback body template or content type missing, sending callback without a body"
        ),
    }
}
