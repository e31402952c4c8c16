use super::error::ReaderError;
use super::playback::ControlView;
use super::text::normalize;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Yields the text a playable reads aloud
pub trait TextProvider: Send + Sync {
    fn text(&self) -> Result<String, ReaderError>;
}

/// Text known up front, such as an article title
pub struct PlainText(String);

impl PlainText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl TextProvider for PlainText {
    fn text(&self) -> Result<String, ReaderError> {
        Ok(normalize(&self.0))
    }
}

/// Article body markup, converted to plain text on demand
pub struct HtmlText {
    html: String,
}

impl HtmlText {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

static HIDDEN_ELEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});

// html2text renders `<a>` as `[text][1]` plus a `[1]: url` footnote
static LINK_FOOTNOTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[\d+\]:.*$").expect("valid regex"));
static LINK_REFERENCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]\[\d+\]").expect("valid regex"));
static BARE_URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

// Markdown markers only where they open or close a word, so `C#`,
// `snake_case` and `5 * 3` survive
static LINE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(#+|>+)\s").expect("valid regex"));
static OPENING_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[\s(])[*_`]+(\S)").expect("valid regex"));
static CLOSING_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(\S)[*_`]+([\s.,;:!?)]|$)").expect("valid regex"));

impl TextProvider for HtmlText {
    fn text(&self) -> Result<String, ReaderError> {
        let visible = HIDDEN_ELEMENTS.replace_all(&self.html, " ");
        let plain_text = html2text::from_read(visible.as_bytes(), usize::MAX);

        let text = LINK_FOOTNOTES.replace_all(&plain_text, " ");
        let text = LINK_REFERENCES.replace_all(&text, "$1");
        let text = BARE_URLS.replace_all(&text, " ");
        let text = LINE_MARKERS.replace_all(&text, " ");
        let text = OPENING_EMPHASIS.replace_all(&text, "${1}${2}");
        let text = CLOSING_EMPHASIS.replace_all(&text, "${1}${2}");

        Ok(normalize(&text))
    }
}

#[derive(Clone)]
pub struct Playable {
    pub text: Arc<dyn TextProvider>,
    pub view: Arc<dyn ControlView>,
}

/// Playables the host application has put on screen, by id
#[derive(Default)]
pub struct PlayableRegistry {
    playables: RwLock<HashMap<String, Playable>>,
}

impl PlayableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a playable. Returns true when `id` was new.
    pub fn register_playable(
        &self,
        id: &str,
        text: Arc<dyn TextProvider>,
        view: Arc<dyn ControlView>,
    ) -> bool {
        let previous = self
            .playables
            .write()
            .insert(id.to_string(), Playable { text, view });
        tracing::debug!(id = %id, replaced = previous.is_some(), "Playable registered");
        previous.is_none()
    }

    pub fn unregister_playable(&self, id: &str) -> bool {
        let removed = self.playables.write().remove(id).is_some();
        if removed {
            tracing::debug!(id = %id, "Playable unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Playable> {
        self.playables.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.playables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.playables.read().is_empty()
    }
}
