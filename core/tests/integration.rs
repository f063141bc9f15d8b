//! Device, device-type and callback lifecycle against the live mock backend.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client over real
//! HTTP through `UreqTransport`. Status codes and bodies are asserted as the
//! client returns them, uninterpreted.

use std::time::Duration;

use serde_json::json;
use sigfox_core::{
    ApiError, CallbackChannel, CallbackConfig, CallbackHttpMethod, CallbackSubtype, CallbackType, CallbackUpdate,
    Credentials, DeviceUpdate, NewDevice, SigfoxClient, TransferDevice, UreqTransport,
};

/// Spawn the mock backend on a background thread and return its base URL.
fn start_mock_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str) -> SigfoxClient {
    SigfoxClient::new(Credentials::new(mock_server::DEFAULT_USERNAME, mock_server::DEFAULT_PASSWORD))
        .with_base_url(base_url)
}

#[test]
fn device_lifecycle() {
    let base_url = start_mock_server();
    let client = client(&base_url);

    // Step 1: unknown device, 404 with an empty body.
    let (status, data) = client.get_device("1A2B").unwrap().into_parts();
    assert_eq!(status, 404);
    assert!(data.is_none());

    // Step 2: create.
    let (status, data) = client.create_device("1A2B", "tracker", "dt1", "PAC0").unwrap().into_parts();
    assert_eq!(status, 201);
    assert_eq!(data, Some(json!({ "id": "1A2B" })));

    // Step 3: creating again conflicts; still a pair, not an error.
    let response = client.create_device("1A2B", "tracker", "dt1", "PAC0").unwrap();
    assert_eq!(response.status, 409);
    assert!(!response.is_success());

    // Step 4: partial update answers 204 with no body.
    let (status, data) = client
        .update_device("1A2B", Some("renamed"), Some(48.85), None, Some("P_0001"))
        .unwrap()
        .into_parts();
    assert_eq!(status, 204);
    assert!(data.is_none());

    // Step 5: read back.
    let (status, data) = client.get_device("1A2B").unwrap().into_parts();
    assert_eq!(status, 200);
    let device = data.unwrap();
    assert_eq!(device["name"], "renamed");
    assert_eq!(device["lat"], 48.85);
    assert!(device.get("lng").is_none());
    assert_eq!(device["productCertificate"]["key"], "P_0001");

    // Step 6: bulk create two more of the same type.
    let new_devices = vec![
        NewDevice { id: "3C".to_string(), pac: "P3".to_string(), name: "three".to_string() },
        NewDevice { id: "4D".to_string(), pac: "P4".to_string(), name: "four".to_string() },
    ];
    let (status, data) = client.bulk_create_devices("dt1", &new_devices).unwrap().into_parts();
    assert_eq!(status, 201);
    assert_eq!(data.unwrap()["total"], 2);

    let (_, data) = client.get_devices("dt1").unwrap().into_parts();
    assert_eq!(data.unwrap()["data"].as_array().unwrap().len(), 3);

    // Step 7: bulk update.
    let updates = vec![DeviceUpdate { id: "3C".to_string(), name: Some("trois".to_string()), lat: None, lng: None }];
    let (status, _) = client.bulk_update_devices(&updates).unwrap().into_parts();
    assert_eq!(status, 201);
    let (_, data) = client.get_device("3C").unwrap().into_parts();
    assert_eq!(data.unwrap()["name"], "trois");

    // Step 8: transfer one device, then the rest in bulk.
    let (status, _) = client.transfer_device("dt2", "1A2B", true, true).unwrap().into_parts();
    assert_eq!(status, 201);
    let rest = vec![TransferDevice::new("3C"), TransferDevice::new("4D")];
    let (status, data) = client.bulk_transfer_devices("dt2", &rest, true, false).unwrap().into_parts();
    assert_eq!(status, 201);
    assert_eq!(data.unwrap()["total"], 2);

    let (_, data) = client.get_devices("dt1").unwrap().into_parts();
    assert!(data.unwrap()["data"].as_array().unwrap().is_empty());
    let (_, data) = client.get_devices("dt2").unwrap().into_parts();
    assert_eq!(data.unwrap()["data"].as_array().unwrap().len(), 3);

    // Step 9: messages with and without `since`.
    let (status, data) = client.get_device_messages("1A2B", None).unwrap().into_parts();
    assert_eq!(status, 200);
    assert_eq!(data, Some(json!({ "data": [] })));
    let (status, _) = client.get_device_messages("1A2B", Some(1_600_000_000_000)).unwrap().into_parts();
    assert_eq!(status, 200);
}

#[test]
fn device_type_and_callback_lifecycle() {
    let base_url = start_mock_server();
    let client = client(&base_url);

    // Step 1: create a device type; the backend assigns the id.
    let (status, data) = client
        .create_device_type("sigfox trackers", "g1", &["c1"], "geo1", Some("fleet"))
        .unwrap()
        .into_parts();
    assert_eq!(status, 201);
    let type_id = data.unwrap()["id"].as_str().unwrap().to_string();

    // Step 2: list, filtered and unfiltered.
    let (_, data) = client.get_device_types().unwrap().into_parts();
    assert_eq!(data.unwrap()["data"][0]["description"], "fleet");
    let (_, data) = client.get_device_type_list(Some("sig")).unwrap().into_parts();
    assert_eq!(data.unwrap()["data"].as_array().unwrap().len(), 1);
    let (_, data) = client.get_device_type_list(Some("meters")).unwrap().into_parts();
    assert!(data.unwrap()["data"].as_array().unwrap().is_empty());

    // Step 3: create a POST callback without a body; it is sent anyway.
    let callback = CallbackConfig::new(
        CallbackChannel::Url,
        CallbackType::Data,
        CallbackSubtype::Uplink,
        "https://example.com/hook",
        CallbackHttpMethod::Post,
    );
    let (status, data) = client.create_device_type_callback(&type_id, &callback).unwrap().into_parts();
    assert_eq!(status, 201);
    let callback_id = data.unwrap()["id"].as_str().unwrap().to_string();

    // Step 4: update it with a complete body.
    let update = CallbackUpdate {
        http_method: Some(CallbackHttpMethod::Put),
        body_template: Some("{\"device\":\"{device}\"}".to_string()),
        content_type: Some("application/json".to_string()),
        ..CallbackUpdate::default()
    };
    let (status, data) = client
        .update_device_type_callback(&type_id, &callback_id, &update)
        .unwrap()
        .into_parts();
    assert_eq!(status, 204);
    assert!(data.is_none());

    // Step 5: list callbacks.
    let (status, data) = client.get_device_type_callbacks(&type_id).unwrap().into_parts();
    assert_eq!(status, 200);
    let body = data.unwrap();
    let listed = &body["data"][0];
    assert_eq!(listed["http_method"], "PUT");
    assert_eq!(listed["callbackSubtype"], 2);
    assert_eq!(listed["contentType"], "application/json");

    // Step 6: callbacks of an unknown device type.
    let (status, data) = client.get_device_type_callbacks("unknown").unwrap().into_parts();
    assert_eq!(status, 404);
    assert!(data.is_none());
}

#[test]
fn contract_information_is_listed() {
    let base_url = start_mock_server();
    let (status, data) = client(&base_url).get_contract_information().unwrap().into_parts();
    assert_eq!(status, 200);
    assert_eq!(data.unwrap()["data"][0]["name"], "Platinum");
}

#[test]
fn wrong_credentials_yield_401_pair() {
    let base_url = start_mock_server();
    let client = SigfoxClient::new(Credentials::new("intruder", "guess")).with_base_url(&base_url);
    let (status, data) = client.get_device_types().unwrap().into_parts();
    assert_eq!(status, 401);
    assert!(data.is_none());
}

#[test]
fn caller_configured_agent_is_used() {
    let base_url = start_mock_server();
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(10)))
        .build()
        .new_agent();
    let credentials = Credentials::new(mock_server::DEFAULT_USERNAME, mock_server::DEFAULT_PASSWORD);
    let client = SigfoxClient::with_transport(credentials, UreqTransport::from_agent(agent)).with_base_url(&base_url);

    let (status, data) = client.get_device("1A2B").unwrap().into_parts();
    assert_eq!(status, 404);
    assert!(data.is_none());
    let (status, _) = client.get_contract_information().unwrap().into_parts();
    assert_eq!(status, 200);
}

#[test]
fn connection_refused_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let client = SigfoxClient::with_transport(Credentials::new("u", "p"), UreqTransport::new())
        .with_base_url(&format!("http://{addr}"));
    let err = client.get_contract_information().unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
