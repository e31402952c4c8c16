pub mod baidu_tts_provider;
pub mod tts_provider;

pub use baidu_tts_provider::BaiduTtsProvider;
pub use tts_provider::{ProviderError, TtsProvider};
