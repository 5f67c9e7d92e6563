//! Shared test helpers for courier API integration tests
//!
//! Provides wiremock-based mock server setup for the merchant endpoints.
//! Each helper mounts the necessary mock endpoints; `setup_courier_mock`
//! returns a client pointing at the mock server.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ordersync_core::domain::{AccountUsername, CourierToken, DeliveryAccountToken, PartnerName, UserId};
use ordersync_courier::client::CourierClient;
use ordersync_courier::provider::HttpCourierApi;

pub const TOKEN: &str = "merchant-token-1";

/// Starts a mock server and returns it with a client and port adapter
pub async fn setup_courier_mock() -> (MockServer, CourierClient, HttpCourierApi) {
    let server = MockServer::start().await;
    let client = CourierClient::with_base_url(server.uri(), Duration::from_secs(2))
        .expect("client for mock server");
    let api = HttpCourierApi::new(client.clone());
    (server, client, api)
}

/// A credential whose secret is [`TOKEN`]
pub fn credential() -> DeliveryAccountToken {
    DeliveryAccountToken::new(
        PartnerName::new("alwaseet").unwrap(),
        AccountUsername::new("seller-1").unwrap(),
        Some(UserId::new("emp1").unwrap()),
        CourierToken::new(TOKEN),
    )
}

/// Wraps `data` in a successful envelope
pub fn ok_envelope(data: Value) -> Value {
    json!({ "status": true, "errNum": "S000", "msg": "ok", "data": data })
}

/// Mounts GET `endpoint` answering 200 with `body` for the test token
pub async fn mount_json(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts GET `endpoint` answering with a bare status code
pub async fn mount_status(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Two merchant orders, one already invoiced, with mixed id encodings
pub fn sample_orders() -> Value {
    json!([
        {
            "id": 99319996,
            "trackingNumber": "99319996",
            "rawStatus": "تم تسليم الفاتورة",
            "invoiceId": "inv42"
        },
        {
            "id": "88120001",
            "trackingNumber": 88120001,
            "rawStatus": "قيد التوصيل الى الزبون (في عهدة المندوب)"
        }
    ])
}
