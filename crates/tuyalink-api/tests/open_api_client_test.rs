#![allow(clippy::unwrap_used)]
// Integration tests for `OpenApiClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tuyalink_api::mq::{BackoffConfig, MqClient, MqSettings};
use tuyalink_api::{AccountMode, Command, Error, Identity, OpenApiClient, Query};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(mode: AccountMode) -> (MockServer, OpenApiClient) {
    let server = MockServer::start().await;
    let client = OpenApiClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "access-id",
        "access-secret".to_string().into(),
        mode,
    )
    .with_dev_channel("tests");
    (server, client)
}

fn identity() -> Identity {
    Identity::new("user@example.com", "password".to_string().into())
        .with_country_code("1")
        .with_schema("smartlife")
}

fn token_body(access: &str, expire_time: i64) -> Value {
    json!({
        "success": true,
        "t": Utc::now().timestamp_millis(),
        "result": {
            "access_token": access,
            "refresh_token": "rt-1",
            "expire_time": expire_time,
            "uid": "ay-uid"
        }
    })
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "t": Utc::now().timestamp_millis(),
        "result": result
    }))
}

async fn mount_login(server: &MockServer, mode: AccountMode, expire_time: i64) {
    Mock::given(method("POST"))
        .and(path(mode.login_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", expire_time)))
        .mount(server)
        .await;
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_smart_home_login_sends_hashed_password_and_sdk_headers() {
    let (server, client) = setup(AccountMode::SmartHome).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-01/associated-users/actions/authorized-login"))
        .and(body_partial_json(json!({
            "username": "user@example.com",
            "password": "5f4dcc3b5aa765d61d8327deb882cf99",
            "country_code": "1",
            "schema": "smartlife"
        })))
        .and(header("client_id", "access-id"))
        .and(header("sign_method", "HMAC-SHA256"))
        .and(header("dev_lang", "rust"))
        .and(header("dev_channel", "tests"))
        .and(header_exists("sign"))
        .and(header_exists("t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", 7200)))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.is_connected());
    client.connect(identity()).await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.uid().as_deref(), Some("ay-uid"));
}

#[tokio::test]
async fn test_custom_login_uses_sha256() {
    let (server, client) = setup(AccountMode::Custom).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-03/users/login"))
        .and(body_partial_json(json!({
            "password": "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", 7200)))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup(AccountMode::SmartHome).await;

    Mock::given(method("POST"))
        .and(path(AccountMode::SmartHome.login_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "code": 2406, "msg": "skill id invalid", "t": 1
        })))
        .mount(&server)
        .await;

    let result = client.connect(identity()).await;
    assert!(
        matches!(result, Err(Error::Authentication { code: 2406, .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_connected());
}

// ── Refresh policy ──────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_within_margin() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 30).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", 7200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/d1"))
        .and(header("access_token", "at-2"))
        .respond_with(ok(json!({ "id": "d1", "name": "Lamp" })))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let device = client.get_device("d1").await.unwrap();
    assert_eq!(device.name, "Lamp");
}

#[tokio::test]
async fn test_no_refresh_outside_margin() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", 7200)))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/d1"))
        .and(header("access_token", "at-1"))
        .respond_with(ok(json!({ "id": "d1" })))
        .expect(2)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    client.get_device("d1").await.unwrap();
    client.get_device("d1").await.unwrap();
}

#[tokio::test]
async fn test_custom_refresh_uses_post() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 10).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-03/users/token/rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", 7200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/devices/d1"))
        .respond_with(ok(json!({ "id": "d1" })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    client.get_device("d1").await.unwrap();
}

// ── Token invalidation ──────────────────────────────────────────────

#[tokio::test]
async fn test_token_invalid_triggers_relogin_without_retry() {
    let (server, client) = setup(AccountMode::SmartHome).await;

    Mock::given(method("POST"))
        .and(path(AccountMode::SmartHome.login_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", 7200)))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "code": 1010, "msg": "token invalid", "t": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let result = client.get_device("d1").await;

    assert!(
        matches!(result, Err(Error::TokenInvalid)),
        "expected TokenInvalid, got: {result:?}"
    );
    assert!(client.is_connected(), "session should be re-established");
}

#[tokio::test]
async fn test_api_failure_maps_code() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/devices/d1/specification"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "code": 1106, "msg": "permission deny", "t": 1
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let err = client.get_specification("d1").await.unwrap_err();
    assert_eq!(err.api_code(), Some(1106));
}

#[tokio::test]
async fn test_http_error_status() {
    let (server, client) = setup(AccountMode::Custom).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/devices/d1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let result = client.get_device("d1").await;
    assert!(
        matches!(result, Err(Error::Api { code: 500, .. })),
        "expected Api error, got: {result:?}"
    );
}

// ── Devices ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_smart_home_batch_status_derived_from_listing() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/"))
        .and(query_param("device_ids", "d1,d2"))
        .respond_with(ok(json!({
            "devices": [
                { "id": "d1", "status": [{ "code": "switch_led", "value": false }] },
                { "id": "d2", "status": [] }
            ]
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let ids = vec!["d1".to_owned(), "d2".to_owned()];
    let status = client.get_devices_status(&ids).await.unwrap();

    assert_eq!(status.len(), 2);
    assert_eq!(status[0].id, "d1");
    assert_eq!(status[0].status[0].code, "switch_led");
}

#[tokio::test]
async fn test_send_commands() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-03/devices/d1/commands"))
        .and(body_partial_json(json!({
            "commands": [{ "code": "switch_led", "value": true }]
        })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let acked = client
        .send_commands("d1", &[Command::new("switch_led", true)])
        .await
        .unwrap();
    assert!(acked);
}

// ── Assets ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_asset_devices_follow_cursor() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-02/assets/a1/devices"))
        .and(query_param("last_row_key", ""))
        .and(query_param("page_size", "100"))
        .respond_with(ok(json!({
            "list": [{ "device_id": "d1" }, { "device_id": "d2" }],
            "has_next": true,
            "last_row_key": "k2",
            "total_size": 3
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-02/assets/a1/devices"))
        .and(query_param("last_row_key", "k2"))
        .respond_with(ok(json!({
            "list": [{ "device_id": "d3" }],
            "has_next": false,
            "total_size": 3
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let ids = client.list_asset_devices("a1").await.unwrap();
    assert_eq!(ids, vec!["d1", "d2", "d3"]);
}

#[tokio::test]
async fn test_asset_devices_overflow_is_an_error() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-02/assets/a1/devices"))
        .respond_with(ok(json!({
            "list": [{ "device_id": "d1" }, { "device_id": "d2" }],
            "has_next": true,
            "last_row_key": "k",
            "total_size": 1
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let result = client.list_asset_devices("a1").await;
    assert!(
        matches!(result, Err(Error::Pagination(_))),
        "expected Pagination error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_collect_device_ids_walks_tree() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    for (asset, devices, children) in [
        ("-1", json!([{ "device_id": "root-only" }]), json!([{ "asset_id": "a1" }, { "asset_id": "a2" }])),
        ("a1", json!([{ "device_id": "d1" }]), json!([])),
        ("a2", json!([{ "device_id": "d2" }]), json!([])),
    ] {
        // The root is only enumerated for children, never for devices.
        let device_calls = u64::from(asset != "-1");
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/iot-02/assets/{asset}/devices")))
            .respond_with(ok(json!({ "list": devices, "has_next": false, "total_size": 10 })))
            .expect(device_calls)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/iot-02/assets/{asset}/sub-assets")))
            .respond_with(ok(json!({ "list": children, "has_next": false })))
            .mount(&server)
            .await;
    }

    client.connect(identity()).await.unwrap();
    let ids = client
        .collect_device_ids(tuyalink_api::assets::ROOT_ASSET_ID)
        .await
        .unwrap();
    assert_eq!(ids, vec!["d1", "d2"]);
}

// ── Broker config ───────────────────────────────────────────────────

#[tokio::test]
async fn test_broker_config_request_body() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-03/open-hub/access-config"))
        .and(body_partial_json(json!({
            "uid": "ay-uid",
            "link_id": "link-1",
            "link_type": "mqtt",
            "topics": "device",
            "msg_encrypted_version": "2.0"
        })))
        .respond_with(ok(json!({
            "url": "ssl://m1.example.com:8883",
            "client_id": "cid",
            "username": "user",
            "password": "0123456789abcdef01234567",
            "source_topic": { "device": "cloud/token/in/x" },
            "expire_time": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let session = client.fetch_broker_session("link-1").await.unwrap();
    assert_eq!(session.expire_time, 7200);
    assert_eq!(session.source_topic["device"], "cloud/token/in/x");
}

#[tokio::test]
async fn test_broker_config_rejection_relogs_and_retries_once() {
    let (server, client) = setup(AccountMode::SmartHome).await;

    Mock::given(method("POST"))
        .and(path(AccountMode::SmartHome.login_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", 7200)))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1.0/open-hub/access/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "code": 1106, "msg": "permission deny", "t": 1
        })))
        .expect(2)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let result = client.fetch_broker_session("link-1").await;
    assert!(
        matches!(result, Err(Error::ConfigFetch { .. })),
        "expected ConfigFetch, got: {result:?}"
    );
}

// ── Event client lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn test_stop_during_backoff_makes_no_new_attempt() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/iot-03/open-hub/access-config"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let settings = MqSettings {
        backoff: BackoffConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
        },
        ..MqSettings::default()
    };
    let mq = MqClient::with_settings(Arc::new(client), settings);
    mq.start();

    // Wait for the first (failing) config fetch.
    let config_path = "/v1.0/iot-03/open-hub/access-config";
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.iter().any(|r| r.url.path() == config_path) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tokio::time::timeout(Duration::from_secs(2), mq.stop())
        .await
        .expect("stop should interrupt the backoff sleep");
    assert!(!mq.is_running());
    assert!(!mq.is_connected());

    let fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == config_path)
        .count();
    assert_eq!(fetches, 1);
}

/// A broker that answers every CONNECT with CONNACK "not authorized" (rc 5).
async fn refusing_broker() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 512];
                if socket.read(&mut buf).await.unwrap_or(0) > 0 {
                    let _ = socket.write_all(&[0x20, 0x02, 0x00, 0x05]).await;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            });
        }
    });
    addr
}

async fn config_fetches(server: &MockServer, config_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == config_path)
        .count()
}

#[tokio::test]
async fn test_not_authorized_connack_fetches_new_session_without_backoff() {
    let broker = refusing_broker().await;
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    let config_path = "/v1.0/iot-03/open-hub/access-config";
    Mock::given(method("POST"))
        .and(path(config_path))
        .respond_with(ok(json!({
            "url": format!("tcp://{broker}"),
            "client_id": "cid",
            "username": "user",
            "password": "0123456789abcdef01234567",
            "source_topic": { "device": "cloud/token/in/x" },
            "expire_time": 7200
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let settings = MqSettings {
        backoff: BackoffConfig {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        },
        ..MqSettings::default()
    };
    let mq = MqClient::with_settings(Arc::new(client), settings);
    mq.start();

    // The first refusal is followed straight away by a fresh session; the
    // second one backs off for 30s.
    let mut fetches = 0;
    for _ in 0..150 {
        fetches = config_fetches(&server, config_path).await;
        if fetches >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = config_fetches(&server, config_path).await;
    mq.stop().await;

    assert_eq!(fetches, 2);
    assert_eq!(settled, 2);
    assert!(!mq.is_connected());
}

#[tokio::test]
async fn test_query_helper_round_trips_through_get() {
    let (server, client) = setup(AccountMode::Custom).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/anything"))
        .and(query_param("a", "1"))
        .respond_with(ok(json!({ "echo": "ok" })))
        .mount(&server)
        .await;

    let query = Query::from([("a".to_owned(), "1".to_owned())]);
    let value: Value = client.get("/v1.0/anything", &query).await.unwrap();
    assert_eq!(value["echo"], "ok");
}

// ── Device extras ───────────────────────────────────────────────────

#[tokio::test]
async fn test_device_status_per_mode() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/devices/d1/status"))
        .respond_with(ok(json!([{ "code": "switch_1", "value": true }])))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let status = client.get_device_status("d1").await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].code, "switch_1");
    assert_eq!(status[0].value, json!(true));

    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/devices/d2"))
        .respond_with(ok(json!({
            "id": "d2",
            "status": [{ "code": "bright_value", "value": 40 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let status = client.get_device_status("d2").await.unwrap();
    assert_eq!(status[0].code, "bright_value");
    assert_eq!(status[0].value, json!(40));
}

#[tokio::test]
async fn test_factory_infos_and_category_functions() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/devices/factory-infos"))
        .and(query_param("device_ids", "d1,d2"))
        .respond_with(ok(json!([
            { "id": "d1", "uuid": "u1", "sn": "s1", "mac": "aa:bb" },
            { "id": "d2" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/iot-03/categories/dj/functions"))
        .respond_with(ok(json!({
            "category": "dj",
            "functions": [{ "code": "switch_led", "type": "Boolean", "values": "{}" }]
        })))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let infos = client
        .get_factory_infos(&["d1".to_owned(), "d2".to_owned()])
        .await
        .unwrap();
    assert_eq!(infos[0].mac, "aa:bb");
    assert_eq!(infos[1].uuid, "");

    let functions = client.get_category_functions("dj").await.unwrap();
    assert_eq!(functions.category, "dj");
    assert_eq!(functions.functions[0].code, "switch_led");
    assert_eq!(functions.functions[0].kind, "Boolean");
}

#[tokio::test]
async fn test_batch_remove_is_custom_only() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/iot-03/devices"))
        .and(query_param("device_ids", "d1,d2"))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    client
        .remove_devices(&["d1".to_owned(), "d2".to_owned()])
        .await
        .unwrap();

    let (_server, client) = setup(AccountMode::SmartHome).await;
    let err = client.remove_devices(&["d1".to_owned()]).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { mode: "smart_home", .. }));
}

// ── Homes, scenes and infrared ──────────────────────────────────────

#[tokio::test]
async fn test_query_scenes_walks_homes() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users/ay-uid/homes"))
        .respond_with(ok(json!([
            { "home_id": 11, "name": "Flat" },
            { "home_id": "12", "name": "Cabin" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/homes/11/scenes"))
        .respond_with(ok(json!([{ "scene_id": "s1", "name": "Night", "enabled": true }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/homes/12/scenes"))
        .respond_with(ok(json!([{ "scene_id": "s2", "name": "Away" }])))
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let scenes = client.query_scenes().await.unwrap();

    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].home_id, "11");
    assert!(scenes[0].enabled);
    assert_eq!(scenes[1].home_id, "12");
    assert_eq!(scenes[1].name, "Away");
}

#[tokio::test]
async fn test_trigger_scene() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;
    Mock::given(method("POST"))
        .and(path("/v1.0/homes/11/scenes/s1/trigger"))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    assert!(client.trigger_scene("11", "s1").await.unwrap());
}

#[tokio::test]
async fn test_custom_accounts_have_no_homes() {
    let (server, client) = setup(AccountMode::Custom).await;
    mount_login(&server, AccountMode::Custom, 7200).await;

    client.connect(identity()).await.unwrap();
    assert!(client.query_scenes().await.unwrap().is_empty());

    let err = client.trigger_scene("11", "s1").await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { operation: "scene trigger", .. }));
    let err = client.list_remotes("ir1").await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { mode: "custom", .. }));

    // Only the login reached the server.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_infrared_remotes_keys_and_command() {
    let (server, client) = setup(AccountMode::SmartHome).await;
    mount_login(&server, AccountMode::SmartHome, 7200).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/infrareds/ir1/remotes"))
        .respond_with(ok(json!([{
            "remote_id": "r1",
            "remote_name": "TV",
            "category_id": 2,
            "brand_id": 9,
            "remote_index": 101
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/infrareds/ir1/remotes/r1/keys"))
        .respond_with(ok(json!({
            "key_list": [
                { "key": "power", "key_id": 1, "key_name": "Power", "standard_key": true },
                { "key": "mute", "key_id": 5 }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/infrareds/ir1/remotes/r1/command"))
        .and(body_partial_json(json!({ "key": "power" })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client.connect(identity()).await.unwrap();
    let remotes = client.list_remotes("ir1").await.unwrap();
    assert_eq!(remotes[0].remote_name, "TV");
    assert_eq!(remotes[0].category_id, "2");

    let keys = client.list_remote_keys("ir1", "r1").await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].standard_key);
    assert_eq!(keys[1].key_id, 5);

    client.send_infrared_key("ir1", "r1", "power").await.unwrap();
}
