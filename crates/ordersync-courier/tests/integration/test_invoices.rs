//! Integration tests for the invoice endpoints

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use ordersync_core::domain::InvoiceId;
use ordersync_core::ports::ICourierApi;

use crate::common;

#[tokio::test]
async fn test_list_invoices() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        "/v1/merchant/get_merchant_invoices",
        common::ok_envelope(json!([
            { "id": 42, "status": "تم الاستلام من قبل التاجر", "ordersCount": 3 },
            { "id": "43", "status": "لم يتم الاستلام" }
        ])),
    )
    .await;

    let invoices = api.list_invoices(&common::credential()).await.unwrap();
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0].id.as_str(), "42");
    assert_eq!(invoices[0].orders_count, Some(3));
    assert_eq!(invoices[1].status, "لم يتم الاستلام");
    assert_eq!(invoices[1].orders_count, None);
}

#[tokio::test]
async fn test_invoice_orders_as_list() {
    let (server, _client, api) = common::setup_courier_mock().await;
    Mock::given(method("GET"))
        .and(path("/v1/merchant/get_merchant_invoice_orders"))
        .and(query_param("invoice_id", "inv42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::ok_envelope(common::sample_orders())),
        )
        .mount(&server)
        .await;

    let orders = api
        .get_invoice_orders(&common::credential(), &InvoiceId::new("inv42").unwrap())
        .await
        .unwrap();
    assert_eq!(orders.len(), 2);
}

#[tokio::test]
async fn test_invoice_orders_wrapped_object() {
    let (server, client, _api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        "/v1/merchant/get_merchant_invoice_orders",
        common::ok_envelope(json!({
            "invoice": [{ "id": 42, "status": "received" }],
            "orders": common::sample_orders()
        })),
    )
    .await;

    let orders = client.invoice_orders(common::TOKEN, "42").await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].id, "88120001");
}
