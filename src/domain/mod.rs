pub mod auth;
pub mod reader;
pub mod relay;
pub mod tts;
