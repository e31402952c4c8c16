use reqwest::Url;

/// Allow-list of storage origins the audio proxy may contact
#[derive(Debug, Clone)]
pub struct AudioOriginPolicy {
    origins: Vec<String>,
}

impl AudioOriginPolicy {
    /// `origins` are `scheme://host[:port]`, lowercase, no trailing slash
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    pub fn allows(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let origin = url.origin().ascii_serialization().to_lowercase();
        self.origins.iter().any(|allowed| *allowed == origin)
    }

    /// Parse `raw` and check it against the allow-list
    pub fn check(&self, raw: &str) -> Option<Url> {
        Url::parse(raw).ok().filter(|url| self.allows(url))
    }
}
