//! Fulfillment provider client for ordercheck.
//!
//! Exchanges an API key for an access token, lists orders page by page
//! (optionally one query per merchant order number), and enriches orders
//! with detail line items where the listing is incomplete. Everything here
//! is blocking; concurrency is a small scoped-thread pool with a shared
//! request pacer.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod wire;

pub use client::{EnrichOutcome, OrderFilter, OrderListing, ProviderClient};
pub use config::{DetailPolicy, ProviderConfig};
pub use error::ProviderError;
pub use wire::OrderDetail;
