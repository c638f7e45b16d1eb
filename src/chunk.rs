//! Paragraph-aware splitting of long article text into message-sized segments.
//!
//! Lengths are counted in characters, not bytes, since chat length limits
//! apply to characters and most of the text this handles is Burmese.

const PARAGRAPH_SEP: &str = "\n\n";

/// Split `text` into segments of at most `limit` characters.
///
/// Paragraphs (separated by a blank line) are packed greedily into segments,
/// rejoined with a blank line. A paragraph longer than `limit` on its own is
/// cut into consecutive slices of exactly `limit` characters, the last one
/// possibly shorter.
///
/// A `limit` of zero or less means no splitting: the text comes back as a
/// single segment, as does any text already within the limit.
pub fn chunk_text(text: &str, limit: i64) -> Vec<String> {
    chunk_text_weighted(text, limit, |_| 1)
}

/// [`chunk_text`] where each character counts as `weight(c)` toward `limit`.
///
/// Used when segments are escaped after splitting, so that the escaped form
/// stays within the limit. Slices of an oversized paragraph never end in the
/// middle of a character, so a character heavier than `limit` gets a slice
/// of its own.
pub fn chunk_text_weighted(text: &str, limit: i64, weight: impl Fn(char) -> usize) -> Vec<String> {
    let measure = |s: &str| s.chars().map(&weight).sum::<usize>();
    if limit <= 0 || measure(text) as i64 <= limit {
        return vec![text.to_string()];
    }
    let limit = limit as usize;

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in text.split(PARAGRAPH_SEP).map(str::trim) {
        if para.is_empty() {
            continue;
        }
        let para_len = measure(para);

        if para_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(hard_split(para, limit, &weight));
            continue;
        }

        let joined_len = if current.is_empty() {
            para_len
        } else {
            current_len + measure(PARAGRAPH_SEP) + para_len
        };

        if joined_len <= limit {
            if !current.is_empty() {
                current.push_str(PARAGRAPH_SEP);
            }
            current.push_str(para);
            current_len = joined_len;
        } else {
            chunks.push(std::mem::replace(&mut current, para.to_string()));
            current_len = para_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut `s` into consecutive slices weighing at most `limit` each.
fn hard_split(s: &str, limit: usize, weight: impl Fn(char) -> usize) -> Vec<String> {
    let mut slices = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for c in s.chars() {
        let w = weight(c);
        if current_len + w > limit && !current.is_empty() {
            slices.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(c);
        current_len += w;
    }
    if !current.is_empty() {
        slices.push(current);
    }
    slices
}
