//! Error classification of courier responses

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use ordersync_core::domain::TrackingNumber;
use ordersync_core::ports::{ICourierApi, RemoteError};
use ordersync_courier::client::CourierClient;
use ordersync_courier::provider::HttpCourierApi;
use ordersync_courier::CourierError;

use crate::common;

const ORDERS: &str = "/v1/merchant/merchant-orders";

#[tokio::test]
async fn test_401_and_403_are_unauthorized() {
    for status in [401, 403] {
        let (server, _client, api) = common::setup_courier_mock().await;
        common::mount_status(&server, ORDERS, status).await;

        let err = api.list_orders(&common::credential()).await.unwrap_err();
        assert_eq!(err, RemoteError::Unauthorized, "status {status}");
    }
}

#[tokio::test]
async fn test_envelope_auth_error_is_unauthorized() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        ORDERS,
        json!({ "status": false, "errNum": 21, "msg": "token expired" }),
    )
    .await;

    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized);
}

#[tokio::test]
async fn test_server_errors_and_throttling_are_unavailable() {
    for status in [429, 500, 502, 503] {
        let (server, _client, api) = common::setup_courier_mock().await;
        common::mount_status(&server, ORDERS, status).await;

        let err = api.list_orders(&common::credential()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)), "status {status}: {err:?}");
    }
}

#[tokio::test]
async fn test_timeout_is_unavailable() {
    let (server, _client, _api) = common::setup_courier_mock().await;
    Mock::given(method("GET"))
        .and(path(ORDERS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::ok_envelope(json!([])))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = CourierClient::with_base_url(server.uri(), Duration::from_millis(50)).unwrap();
    let raw = client.merchant_orders(common::TOKEN).await.unwrap_err();
    assert!(matches!(raw, CourierError::Timeout), "got {raw:?}");

    let api = HttpCourierApi::new(client);
    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let client = CourierClient::with_base_url("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let api = HttpCourierApi::new(client);

    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let (server, _client, api) = common::setup_courier_mock().await;
    Mock::given(method("GET"))
        .and(path(ORDERS))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));
}

#[tokio::test]
async fn test_unexpected_shape_is_malformed() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        ORDERS,
        common::ok_envelope(json!([{ "id": 1, "status": "missing fields" }])),
    )
    .await;

    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));
}

#[tokio::test]
async fn test_envelope_rejection_is_malformed() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        ORDERS,
        json!({ "status": false, "errNum": "E500", "msg": "partial outage" }),
    )
    .await;

    let err = api.list_orders(&common::credential()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));
}

#[tokio::test]
async fn test_detail_server_error_is_not_treated_as_missing() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_status(&server, "/v1/merchant/order", 503).await;

    let err = api
        .get_order_detail(&common::credential(), &TrackingNumber::new("T1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
}
