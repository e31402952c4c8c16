pub mod auth;
pub mod config;
pub mod http;
pub mod provider;
pub mod relay_client;
