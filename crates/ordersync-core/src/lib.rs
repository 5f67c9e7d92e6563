//! OrderSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Order`, `OrderUpdate`, `DeliveryAccountToken`, `ActingUser`
//! - **Port definitions** - Traits for adapters: `ICourierApi`, `IOrderStore`, `ITokenStore`, `IUserDirectory`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the policy
//! and sync crates orchestrate domain entities through them.

pub mod config;
pub mod domain;
pub mod ports;
