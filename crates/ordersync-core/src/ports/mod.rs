//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICourierApi`] - Courier partner order and invoice reads
//! - [`IOrderStore`] - Persistent storage for local orders
//! - [`ITokenStore`] - Read access to courier account credentials
//! - [`IUserDirectory`] - Role lookups for acting users

pub mod courier_api;
pub mod order_store;
pub mod token_store;
pub mod user_directory;

pub use courier_api::{ICourierApi, RemoteError, RemoteInvoice, RemoteOrder};
pub use order_store::{IOrderStore, OrderFilter, StoreError};
pub use token_store::ITokenStore;
pub use user_directory::{resolve_acting_user, IUserDirectory};
