//! doppel-api — HTTP transport for the face-swap service.
//!
//! Thin wrapper over `reqwest`: one request per operation, no retries.
//! Transport and HTTP failures are classified into the domain error shapes
//! from `doppel-core` before they reach the flow.

pub mod client;
pub mod config;

pub use client::SwapClient;
pub use config::ApiConfig;
