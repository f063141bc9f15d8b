use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_USERNAME: &str = "mock-user";
pub const DEFAULT_PASSWORD: &str = "mock-password";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCertificate {
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub device_type_id: String,
    pub pac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_certificate: Option<ProductCertificate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: String,
    pub name: String,
    pub group_id: String,
    pub contracts: Vec<String>,
    pub geoloc_payload_config_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub id: String,
    pub channel: String,
    #[serde(rename = "callbackType")]
    pub callback_type: u8,
    #[serde(rename = "callbackSubtype")]
    pub callback_subtype: u8,
    pub is_enabled: bool,
    pub url: String,
    pub http_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(rename = "bodyTemplate", default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub device: String,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
    pub data: String,
    pub seq_number: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDevice {
    pub id: String,
    pub name: String,
    pub device_type_id: String,
    pub pac: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDevice {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub product_certificate: Option<ProductCertificate>,
}

#[derive(Deserialize)]
pub struct BulkDevice {
    pub id: String,
    pub pac: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreate {
    pub device_type_id: String,
    pub data: Vec<BulkDevice>,
}

#[derive(Deserialize)]
pub struct BulkUpdateEntry {
    pub id: String,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
pub struct BulkUpdate {
    pub data: Vec<BulkUpdateEntry>,
}

#[derive(Deserialize)]
pub struct TransferEntry {
    pub id: String,
    pub keep_history: Option<bool>,
    pub activable: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTransfer {
    pub device_type_id: String,
    pub data: Vec<TransferEntry>,
}

#[derive(Deserialize)]
pub struct CreateDeviceType {
    pub name: String,
    pub group_id: String,
    pub contracts: Vec<String>,
    pub geoloc_payload_config_id: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackFields {
    pub channel: Option<String>,
    #[serde(rename = "callbackType")]
    pub callback_type: Option<u8>,
    #[serde(rename = "callbackSubtype")]
    pub callback_subtype: Option<u8>,
    pub is_enabled: Option<bool>,
    pub url: Option<String>,
    pub http_method: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(rename = "bodyTemplate")]
    pub body_template: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

#[derive(Deserialize)]
pub struct NameFilter {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct DeviceTypeFilter {
    #[serde(rename = "deviceTypeId")]
    pub device_type_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SinceFilter {
    pub since: Option<u64>,
}

/// In-memory backend state, keyed for deterministic listing order.
#[derive(Debug, Default)]
pub struct Backend {
    pub devices: BTreeMap<String, Device>,
    pub device_types: BTreeMap<String, DeviceType>,
    pub callbacks: BTreeMap<String, Vec<Callback>>,
    pub messages: Vec<Message>,
    pub contracts: Vec<ContractInfo>,
}

impl Backend {
    /// A backend with one contract and nothing else.
    pub fn seeded() -> Self {
        Self {
            contracts: vec![ContractInfo {
                id: "5f2b1a9e7d3c4e0012ab34cd".to_string(),
                name: "Platinum".to_string(),
            }],
            ..Self::default()
        }
    }

    pub fn into_db(self) -> Db {
        Arc::new(RwLock::new(self))
    }
}

pub type Db = Arc<RwLock<Backend>>;

#[derive(Clone)]
struct AppState {
    db: Db,
    expected_auth: Arc<str>,
}

pub fn app() -> Router {
    app_with(Backend::seeded().into_db(), DEFAULT_USERNAME, DEFAULT_PASSWORD)
}

/// Router over `db` that only accepts Basic auth for `username:password`.
pub fn app_with(db: Db, username: &str, password: &str) -> Router {
    let expected = format!("Basic {}", STANDARD.encode(format!("{username}:{password}")));
    let state = AppState {
        db,
        expected_auth: expected.into(),
    };
    Router::new()
        .route("/device-types", get(list_device_types).post(create_device_type))
        .route("/device-types/{id}/callbacks", get(list_callbacks))
        .route("/device_types/{id}/callbacks", post(create_callback))
        .route("/device_types/{id}/callbacks/{callback_id}", put(update_callback))
        .route("/devices", get(list_devices).post(create_device))
        .route("/devices/bulk", post(bulk_create).put(bulk_update))
        .route("/devices/bulk/transfer", post(bulk_transfer))
        .route("/devices/{id}", get(get_device).put(update_device))
        .route("/devices/{id}/messages", get(device_messages))
        .route("/contract-infos", get(contract_infos))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == &*state.expected_auth);
    if !authorized {
        debug!(uri = %request.uri(), "rejecting unauthenticated request");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn listing<T: Serialize>(items: Vec<T>) -> Json<Value> {
    Json(json!({ "data": items }))
}

fn job(total: usize) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({ "total": total, "jobId": Uuid::new_v4() })),
    )
}

async fn list_device_types(State(state): State<AppState>, Query(filter): Query<NameFilter>) -> Json<Value> {
    let backend = state.db.read().await;
    let types = backend
        .device_types
        .values()
        .filter(|t| filter.name.as_deref().map_or(true, |name| t.name.contains(name)))
        .cloned()
        .collect();
    listing::<DeviceType>(types)
}

async fn create_device_type(
    State(state): State<AppState>,
    Json(input): Json<CreateDeviceType>,
) -> (StatusCode, Json<Value>) {
    let device_type = DeviceType {
        id: new_id(),
        name: input.name,
        group_id: input.group_id,
        contracts: input.contracts,
        geoloc_payload_config_id: input.geoloc_payload_config_id,
        description: input.description,
    };
    let id = device_type.id.clone();
    state.db.write().await.device_types.insert(id.clone(), device_type);
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn list_callbacks(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    let backend = state.db.read().await;
    if !backend.device_types.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let callbacks = backend.callbacks.get(&id).cloned().unwrap_or_default();
    Ok(listing(callbacks))
}

async fn create_callback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CallbackFields>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut backend = state.db.write().await;
    if !backend.device_types.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let (Some(channel), Some(callback_type), Some(callback_subtype), Some(url), Some(http_method)) = (
        input.channel,
        input.callback_type,
        input.callback_subtype,
        input.url,
        input.http_method,
    ) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let callback = Callback {
        id: new_id(),
        channel,
        callback_type,
        callback_subtype,
        is_enabled: input.is_enabled.unwrap_or(true),
        url,
        http_method,
        headers: input.headers,
        body_template: input.body_template,
        content_type: input.content_type,
    };
    let callback_id = callback.id.clone();
    backend.callbacks.entry(id).or_default().push(callback);
    Ok((StatusCode::CREATED, Json(json!({ "id": callback_id }))))
}

async fn update_callback(
    State(state): State<AppState>,
    Path((id, callback_id)): Path<(String, String)>,
    Json(input): Json<CallbackFields>,
) -> StatusCode {
    let mut backend = state.db.write().await;
    let Some(callback) = backend
        .callbacks
        .get_mut(&id)
        .and_then(|callbacks| callbacks.iter_mut().find(|c| c.id == callback_id))
    else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(channel) = input.channel {
        callback.channel = channel;
    }
    if let Some(callback_type) = input.callback_type {
        callback.callback_type = callback_type;
    }
    if let Some(callback_subtype) = input.callback_subtype {
        callback.callback_subtype = callback_subtype;
    }
    if let Some(is_enabled) = input.is_enabled {
        callback.is_enabled = is_enabled;
    }
    if let Some(url) = input.url {
        callback.url = url;
    }
    if let Some(http_method) = input.http_method {
        callback.http_method = http_method;
    }
    if input.headers.is_some() {
        callback.headers = input.headers;
    }
    if input.body_template.is_some() {
        callback.body_template = input.body_template;
    }
    if input.content_type.is_some() {
        callback.content_type = input.content_type;
    }
    StatusCode::NO_CONTENT
}

async fn list_devices(State(state): State<AppState>, Query(filter): Query<DeviceTypeFilter>) -> Json<Value> {
    let backend = state.db.read().await;
    let devices = backend
        .devices
        .values()
        .filter(|d| {
            filter
                .device_type_id
                .as_deref()
                .map_or(true, |type_id| d.device_type_id == type_id)
        })
        .cloned()
        .collect();
    listing::<Device>(devices)
}

async fn create_device(
    State(state): State<AppState>,
    Json(input): Json<CreateDevice>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut backend = state.db.write().await;
    if backend.devices.contains_key(&input.id) {
        return Err(StatusCode::CONFLICT);
    }
    let device = Device {
        id: input.id,
        name: input.name,
        device_type_id: input.device_type_id,
        pac: input.pac,
        lat: None,
        lng: None,
        product_certificate: None,
    };
    let id = device.id.clone();
    backend.devices.insert(id.clone(), device);
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Device>, StatusCode> {
    let backend = state.db.read().await;
    backend.devices.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateDevice>,
) -> StatusCode {
    let mut backend = state.db.write().await;
    let Some(device) = backend.devices.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(name) = input.name {
        device.name = name;
    }
    if input.lat.is_some() {
        device.lat = input.lat;
    }
    if input.lng.is_some() {
        device.lng = input.lng;
    }
    if input.product_certificate.is_some() {
        device.product_certificate = input.product_certificate;
    }
    StatusCode::NO_CONTENT
}

async fn device_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(filter): Query<SinceFilter>,
) -> Result<Json<Value>, StatusCode> {
    let backend = state.db.read().await;
    if !backend.devices.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let messages = backend
        .messages
        .iter()
        .filter(|m| m.device == id && filter.since.map_or(true, |since| m.time >= since))
        .cloned()
        .collect();
    Ok(listing::<Message>(messages))
}

async fn bulk_create(State(state): State<AppState>, Json(input): Json<BulkCreate>) -> (StatusCode, Json<Value>) {
    let mut backend = state.db.write().await;
    let total = input.data.len();
    for entry in input.data {
        let device = Device {
            id: entry.id.clone(),
            name: entry.name,
            device_type_id: input.device_type_id.clone(),
            pac: entry.pac,
            lat: None,
            lng: None,
            product_certificate: None,
        };
        backend.devices.entry(entry.id).or_insert(device);
    }
    job(total)
}

async fn bulk_update(State(state): State<AppState>, Json(input): Json<BulkUpdate>) -> (StatusCode, Json<Value>) {
    let mut backend = state.db.write().await;
    let total = input.data.len();
    for entry in input.data {
        if let Some(device) = backend.devices.get_mut(&entry.id) {
            if let Some(name) = entry.name {
                device.name = name;
            }
            if entry.lat.is_some() {
                device.lat = entry.lat;
            }
            if entry.lng.is_some() {
                device.lng = entry.lng;
            }
        }
    }
    job(total)
}

async fn bulk_transfer(State(state): State<AppState>, Json(input): Json<BulkTransfer>) -> (StatusCode, Json<Value>) {
    let mut backend = state.db.write().await;
    let total = input.data.len();
    for entry in input.data {
        if let Some(device) = backend.devices.get_mut(&entry.id) {
            device.device_type_id = input.device_type_id.clone();
        }
        // Dropping history removes everything received so far.
        if entry.keep_history == Some(false) {
            backend.messages.retain(|m| m.device != entry.id);
        }
        debug!(device = %entry.id, activable = ?entry.activable, "transferred");
    }
    job(total)
}

async fn contract_infos(State(state): State<AppState>) -> Json<Value> {
    let backend = state.db.read().await;
    listing(backend.contracts.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_serializes_camel_case_and_skips_absent_fields() {
        let device = Device {
            id: "1A2B".to_string(),
            name: "tracker".to_string(),
            device_type_id: "dt1".to_string(),
            pac: "PAC0".to_string(),
            lat: None,
            lng: None,
            product_certificate: None,
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["deviceTypeId"], "dt1");
        assert!(json.get("lat").is_none());
        assert!(json.get("productCertificate").is_none());
    }

    #[test]
    fn callback_fields_read_client_keys() {
        let input: CallbackFields = serde_json::from_str(
            r#"{"channel":"URL","callbackType":0,"callbackSubtype":2,"is_enabled":true,
                "url":"https://example.com","http_method":"POST","bodyTemplate":"{}","contentType":"application/json"}"#,
        )
        .unwrap();
        assert_eq!(input.callback_subtype, Some(2));
        assert_eq!(input.body_template.as_deref(), Some("{}"));
        assert_eq!(input.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn transfer_entry_flags_are_optional() {
        let entry: TransferEntry = serde_json::from_str(r#"{"id":"A"}"#).unwrap();
        assert!(entry.keep_history.is_none());
        assert!(entry.activable.is_none());
    }

    #[test]
    fn update_device_all_fields_optional() {
        let input: UpdateDevice = serde_json::from_str("{}").unwrap();
        assert!(input.name.is_none());
        assert!(input.product_certificate.is_none());
    }

    #[test]
    fn seeded_backend_has_a_contract() {
        let backend = Backend::seeded();
        assert_eq!(backend.contracts.len(), 1);
        assert!(backend.devices.is_empty());
    }
}
