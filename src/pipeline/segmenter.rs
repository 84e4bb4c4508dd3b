//! Sentence segmentation of streamed generation output.
//!
//! A sentence ends at `.`, `!`, `?` or `;` followed by whitespace (the whole
//! whitespace run belongs to the sentence), or at a newline. Fragments are
//! cleaned for speech before they are emitted; fragments that are empty
//! after cleaning are dropped.

use crate::pipeline::messages::SentenceFragment;

/// Find the first sentence terminator in `text`.
///
/// Returns the byte offset just past the match, or `None` if the text holds
/// no complete sentence yet.
pub fn find_sentence_end(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\n' {
            return Some(i + c.len_utf8());
        }
        if matches!(c, '.' | '!' | '?' | ';') {
            let mut end = None;
            while let Some(&(j, ws)) = chars.peek() {
                if !ws.is_whitespace() {
                    break;
                }
                end = Some(j + ws.len_utf8());
                chars.next();
            }
            if end.is_some() {
                return end;
            }
        }
    }
    None
}

/// Whether `text` contains at least one complete sentence.
pub fn has_sentence_end(text: &str) -> bool {
    find_sentence_end(text).is_some()
}

/// Carve every complete sentence off the front of `buffer`.
///
/// Each cleaned, non-empty sentence is passed to `emit` in order. Returns
/// the unterminated remainder, which the caller prepends to the next
/// increment. Feeding text in any chunking yields the same fragments as
/// feeding it all at once.
pub fn extract<F>(buffer: &str, mut emit: F) -> String
where
    F: FnMut(SentenceFragment),
{
    let mut rest = buffer;
    while let Some(end) = find_sentence_end(rest) {
        let (sentence, tail) = rest.split_at(end);
        if let Some(fragment) = fragment_from(sentence) {
            emit(fragment);
        }
        rest = tail;
    }
    rest.to_owned()
}

/// Clean a final unterminated remainder into a fragment, if anything
/// speakable is left.
pub fn fragment_from(text: &str) -> Option<SentenceFragment> {
    let text = clean_for_tts(text);
    if text.is_empty() {
        None
    } else {
        Some(SentenceFragment { text })
    }
}

/// Strip emoji and markdown emphasis/heading/code characters, then trim.
pub fn clean_for_tts(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '*' | '#' | '`') && !is_emoji(c))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF     // emoticons, symbols, transport, flags, supplemental
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2B00..=0x2B55
            | 0x2300..=0x23FF // misc technical (watch, hourglass, media keys)
            | 0x24C2
            | 0x3030
            | 0x200D          // zero-width joiner
            | 0xFE0F          // variation selector-16
    )
}
