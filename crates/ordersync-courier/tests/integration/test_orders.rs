//! Integration tests for the order endpoints

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use ordersync_core::domain::TrackingNumber;
use ordersync_core::ports::ICourierApi;

use crate::common;

#[tokio::test]
async fn test_list_orders_parses_envelope() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        "/v1/merchant/merchant-orders",
        common::ok_envelope(common::sample_orders()),
    )
    .await;

    let orders = api.list_orders(&common::credential()).await.expect("list_orders failed");

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id.as_str(), "99319996");
    assert_eq!(orders[0].raw_status, "تم تسليم الفاتورة");
    assert_eq!(orders[0].invoice_id.as_ref().unwrap().as_str(), "inv42");
    assert_eq!(orders[1].tracking_number.as_str(), "88120001");
    assert!(orders[1].invoice_id.is_none());
}

#[tokio::test]
async fn test_list_orders_null_data_is_empty() {
    let (server, client, _api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        "/v1/merchant/merchant-orders",
        json!({ "status": true, "errNum": "S000", "msg": "ok", "data": null }),
    )
    .await;

    let orders = client.merchant_orders(common::TOKEN).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_order_detail_found() {
    let (server, _client, api) = common::setup_courier_mock().await;
    Mock::given(method("GET"))
        .and(path("/v1/merchant/order"))
        .and(query_param("token", common::TOKEN))
        .and(query_param("qr_id", "99319996"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!({
            "id": 99319996,
            "trackingNumber": "99319996",
            "rawStatus": "تم التسليم للزبون"
        }))))
        .mount(&server)
        .await;

    let order = api
        .get_order_detail(&common::credential(), &TrackingNumber::new("99319996").unwrap())
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(order.raw_status, "تم التسليم للزبون");
}

#[tokio::test]
async fn test_order_detail_accepts_single_element_list() {
    let (server, client, _api) = common::setup_courier_mock().await;
    Mock::given(method("GET"))
        .and(path("/v1/merchant/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::ok_envelope(json!([{
            "id": "5",
            "trackingNumber": "T5",
            "rawStatus": "فعال"
        }]))))
        .mount(&server)
        .await;

    let order = client.order_by_qr(common::TOKEN, "T5").await.unwrap().unwrap();
    assert_eq!(order.id, "5");
}

#[tokio::test]
async fn test_order_detail_404_is_none() {
    let (server, _client, api) = common::setup_courier_mock().await;
    common::mount_status(&server, "/v1/merchant/order", 404).await;

    let order = api
        .get_order_detail(&common::credential(), &TrackingNumber::new("gone").unwrap())
        .await
        .unwrap();
    assert!(order.is_none());
}

#[tokio::test]
async fn test_order_detail_empty_list_is_none() {
    let (server, client, _api) = common::setup_courier_mock().await;
    common::mount_json(&server, "/v1/merchant/order", common::ok_envelope(json!([]))).await;

    assert!(client.order_by_qr(common::TOKEN, "T9").await.unwrap().is_none());
}

#[tokio::test]
async fn test_order_detail_not_found_err_num_is_none() {
    let (server, client, _api) = common::setup_courier_mock().await;
    common::mount_json(
        &server,
        "/v1/merchant/order",
        json!({ "status": false, "errNum": 404, "msg": "order not found" }),
    )
    .await;

    assert!(client.order_by_qr(common::TOKEN, "T9").await.unwrap().is_none());
}
