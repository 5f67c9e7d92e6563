//! Integration tests for ordersync-courier
//!
//! Uses wiremock to simulate the courier merchant API and verifies
//! end-to-end behavior of the CourierClient and the HttpCourierApi port
//! implementation, including error classification.

mod common;

mod test_errors;
mod test_invoices;
mod test_orders;
