//! Courier merchant API client
//!
//! Provides a typed HTTP client for the courier's merchant endpoints.
//! Handles the token query parameter, the `{status, errNum, msg, data}`
//! response envelope, and mapping of HTTP failures onto [`CourierError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ordersync_courier::client::CourierClient;
//!
//! # async fn example() -> Result<(), ordersync_courier::CourierError> {
//! let client = CourierClient::new(Duration::from_secs(15))?;
//! let orders = client.merchant_orders("merchant-token").await?;
//! println!("{} orders", orders.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tracing::{debug, warn};
use url::Url;

use crate::CourierError;

/// Base URL of the courier merchant API
pub const DEFAULT_BASE_URL: &str = "https://api.alwaseet-iq.net";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Envelope `errNum` values meaning the token was rejected
const AUTH_ERROR_CODES: &[&str] = &["21", "401"];

/// Envelope `errNum` values meaning the requested order does not exist
const NOT_FOUND_ERROR_CODES: &[&str] = &["404"];

// ============================================================================
// Courier API response types
// ============================================================================

/// Identifier that the courier sends as either a JSON string or number
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(StringOrNumber::deserialize(deserializer)?.into_string())
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(StringOrNumber::into_string)
        .filter(|s| !s.trim().is_empty()))
}

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: bool,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    err_num: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

/// One order as returned by the merchant endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub tracking_number: String,
    pub raw_status: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub invoice_id: Option<String>,
}

/// One merchant invoice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierInvoice {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub orders_count: Option<u32>,
}

/// The order detail endpoint answers with an object or a one-element list
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(CourierOrder),
    Many(Vec<CourierOrder>),
}

/// The invoice orders endpoint answers with a list or `{orders: [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum InvoiceOrdersData {
    List(Vec<CourierOrder>),
    Wrapped { orders: Vec<CourierOrder> },
}

// ============================================================================
// CourierClient
// ============================================================================

/// HTTP client for courier merchant API calls
///
/// Wraps `reqwest::Client` with the per-request timeout, base URL
/// construction and response envelope handling. The client holds no
/// credential; every call takes the merchant token it should use.
#[derive(Debug, Clone)]
pub struct CourierClient {
    client: Client,
    base_url: String,
}

impl CourierClient {
    /// Creates a client for the production API
    pub fn new(timeout: Duration) -> Result<Self, CourierError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, CourierError> {
        let parsed = Url::parse(base_url.as_ref())?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request for `path` carrying the merchant token
    pub fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url).query(&[("token", token)])
    }

    /// Sends a request and unwraps the response envelope
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<Option<T>, CourierError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CourierError::Timeout
            } else {
                CourierError::NetworkError(e)
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CourierError::Unauthorized(format!("{endpoint} returned {status}")));
            }
            StatusCode::NOT_FOUND => {
                return Err(CourierError::NotFound(endpoint.to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(endpoint, "Courier rate limit hit");
                return Err(CourierError::TooManyRequests);
            }
            s if s.is_server_error() => {
                return Err(CourierError::ServerError(format!("{endpoint} returned {s}")));
            }
            s if !s.is_success() => {
                return Err(CourierError::InvalidResponse(format!(
                    "{endpoint} returned unexpected status {s}"
                )));
            }
            _ => {}
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                CourierError::Timeout
            } else {
                CourierError::NetworkError(e)
            }
        })?;

        let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
            CourierError::InvalidResponse(format!("failed to parse {endpoint} response: {e}"))
        })?;

        if !envelope.status {
            let msg = envelope.msg.unwrap_or_default();
            let err_num = envelope.err_num;
            let code = err_num.as_deref().unwrap_or_default();
            if AUTH_ERROR_CODES.contains(&code) {
                return Err(CourierError::Unauthorized(msg));
            }
            if NOT_FOUND_ERROR_CODES.contains(&code) {
                return Err(CourierError::NotFound(msg));
            }
            return Err(CourierError::Rejected { err_num, msg });
        }

        Ok(envelope.data)
    }

    /// Lists every order visible to the merchant token
    ///
    /// `GET /v1/merchant/merchant-orders`
    pub async fn merchant_orders(&self, token: &str) -> Result<Vec<CourierOrder>, CourierError> {
        let request = self.request(Method::GET, "/v1/merchant/merchant-orders", token);
        let orders: Vec<CourierOrder> = self
            .fetch(request, "merchant-orders")
            .await?
            .unwrap_or_default();
        debug!(count = orders.len(), "Fetched merchant orders");
        Ok(orders)
    }

    /// Looks up one order by scan code / QR id
    ///
    /// `GET /v1/merchant/order?qr_id=`. Returns `Ok(None)` when the courier
    /// does not know the order.
    pub async fn order_by_qr(
        &self,
        token: &str,
        qr_id: &str,
    ) -> Result<Option<CourierOrder>, CourierError> {
        let request = self
            .request(Method::GET, "/v1/merchant/order", token)
            .query(&[("qr_id", qr_id)]);

        match self.fetch::<OneOrMany>(request, "order").await {
            Ok(Some(OneOrMany::One(order))) => Ok(Some(order)),
            Ok(Some(OneOrMany::Many(orders))) => Ok(orders.into_iter().next()),
            Ok(None) => Ok(None),
            Err(CourierError::NotFound(_)) => {
                debug!(qr_id, "Order not found at courier");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Lists merchant invoices
    ///
    /// `GET /v1/merchant/get_merchant_invoices`
    pub async fn merchant_invoices(&self, token: &str) -> Result<Vec<CourierInvoice>, CourierError> {
        let request = self.request(Method::GET, "/v1/merchant/get_merchant_invoices", token);
        let invoices: Vec<CourierInvoice> = self
            .fetch(request, "get_merchant_invoices")
            .await?
            .unwrap_or_default();
        debug!(count = invoices.len(), "Fetched merchant invoices");
        Ok(invoices)
    }

    /// Lists the orders covered by one invoice
    ///
    /// `GET /v1/merchant/get_merchant_invoice_orders?invoice_id=`
    pub async fn invoice_orders(
        &self,
        token: &str,
        invoice_id: &str,
    ) -> Result<Vec<CourierOrder>, CourierError> {
        let request = self
            .request(Method::GET, "/v1/merchant/get_merchant_invoice_orders", token)
            .query(&[("invoice_id", invoice_id)]);

        let orders = match self
            .fetch::<InvoiceOrdersData>(request, "get_merchant_invoice_orders")
            .await?
        {
            Some(InvoiceOrdersData::List(orders)) => orders,
            Some(InvoiceOrdersData::Wrapped { orders }) => orders,
            None => Vec::new(),
        };
        debug!(invoice_id, count = orders.len(), "Fetched invoice orders");
        Ok(orders)
    }
}
