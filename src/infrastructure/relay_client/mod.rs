pub mod client;
pub mod http_relay_client;

pub use client::{RelayClient, RelayClientError};
pub use http_relay_client::HttpRelayClient;
