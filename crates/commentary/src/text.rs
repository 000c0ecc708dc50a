//! Text helpers shared by the aggregator and the LLM adapters.

/// Counts words with Unicode awareness.
///
/// Contiguous alphanumeric runs count as one word; every CJK
/// ideograph/kana/hangul syllable counts as a word on its own, since those
/// scripts do not separate words with spaces.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() {
            if !in_word {
                count += 1;
            }
            in_word = true;
        } else {
            in_word = false;
        }
    }
    count
}

fn is_cjk(c: char) -> bool {
    let u = c as u32;
    (0x3040..=0x30FF).contains(&u)      // hiragana + katakana
        || (0x3400..=0x4DBF).contains(&u)
        || (0x4E00..=0x9FFF).contains(&u)
        || (0xAC00..=0xD7AF).contains(&u) // hangul syllables
}

/// Returns the last `max_chars` characters of `text` (UTF-8 safe).
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}
