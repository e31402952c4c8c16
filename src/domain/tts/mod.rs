pub mod job;
pub mod voice;

pub use job::{AccessToken, JobState, SynthesisJob};
pub use voice::{Backend, SynthesisRequest, VoiceParams};

/// Audio payload with its MIME type
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub content_type: String,
    pub data: bytes::Bytes,
}

impl Audio {
    pub fn new(content_type: impl Into<String>, data: impl Into<bytes::Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
