use crate::domain::tts::VoiceParams;

/// Trim and collapse every whitespace run into a single space
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 32-bit rolling hash over UTF-16 code units (`h = h * 31 + unit`, wrapping).
///
/// Not collision resistant. Good enough to address a few hundred cached
/// articles, never use it where an attacker picks the input.
pub fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(unit as i32)
    })
}

/// Cache key of a synthesis: `"{textHash}-{voiceHash}"`.
///
/// `text` is expected to be normalized already.
pub fn cache_key(text: &str, voice: &VoiceParams) -> String {
    format!(
        "{}-{}",
        rolling_hash(text),
        rolling_hash(&voice.fingerprint())
    )
}
