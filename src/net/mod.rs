//! Shared networking infrastructure.

pub mod client;

pub use client::{ApiClient, ApiClientBuilder, CONNECT_TIMEOUT, REQUEST_TIMEOUT, USER_AGENT};
