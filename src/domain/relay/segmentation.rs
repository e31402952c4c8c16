/// Per-segment budget of the long-text API, in Unicode code points
pub const MAX_SEGMENT_CHARS: usize = 2000;

/// Chunk size used when a single sentence exceeds the budget
pub const HARD_SPLIT_CHARS: usize = 1500;

const SENTENCE_TERMINATORS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

/// Split text into ordered segments that fit the long-text API.
///
/// Sentences keep their terminating punctuation and are joined with a single
/// space. A sentence longer than the budget is cut into fixed-size chunks.
pub fn split_into_segments(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in text.split_inclusive(is_terminator) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let sentence_len = sentence.chars().count();
        let joined_len = if current.is_empty() {
            sentence_len
        } else {
            current_len + 1 + sentence_len
        };

        if joined_len <= MAX_SEGMENT_CHARS {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined_len;
            continue;
        }

        if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if sentence_len > MAX_SEGMENT_CHARS {
            let chars: Vec<char> = sentence.chars().collect();
            for chunk in chars.chunks(HARD_SPLIT_CHARS) {
                segments.push(chunk.iter().collect());
            }
        } else {
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    tracing::debug!(
        original_chars = text.chars().count(),
        segment_count = segments.len(),
        "Text segmented for long-text synthesis"
    );

    segments
}
