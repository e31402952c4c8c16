pub mod dto;
pub mod error;
pub mod origin;
pub mod segmentation;
pub mod service;

pub use error::RelayError;
pub use origin::AudioOriginPolicy;
pub use segmentation::split_into_segments;
pub use service::{RelayService, RelayServiceApi, DEFAULT_AUDIO_FORMAT};
