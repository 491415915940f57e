//! HTTP client building with retry middleware, shared by the provider clients.

mod client;
mod retry;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use retry::BackoffPolicy;
