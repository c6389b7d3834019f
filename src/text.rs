//! Char-indexed string helpers and word motion
//!
//! Cursor columns everywhere are char indices, not byte offsets.

/// Two-class split used by word motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Word,
    Other,
}

impl CharClass {
    pub fn of(c: char) -> Self {
        if c.is_alphanumeric() {
            CharClass::Word
        } else {
            CharClass::Other
        }
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of char index `x` (clamped to the end)
pub fn byte_index(s: &str, x: usize) -> usize {
    s.char_indices().nth(x).map(|(i, _)| i).unwrap_or(s.len())
}

/// Char index of byte offset `byte`
pub fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

pub fn insert_char(s: &mut String, x: usize, c: char) {
    let at = byte_index(s, x);
    s.insert(at, c);
}

pub fn insert_str(s: &mut String, x: usize, text: &str) {
    let at = byte_index(s, x);
    s.insert_str(at, text);
}

pub fn remove_char(s: &mut String, x: usize) -> Option<char> {
    if x >= char_len(s) {
        return None;
    }
    let at = byte_index(s, x);
    Some(s.remove(at))
}

/// Split off everything from char index `x`
pub fn split_off(s: &mut String, x: usize) -> String {
    let at = byte_index(s, x);
    s.split_off(at)
}

/// Chars `start..end` as a new string
pub fn slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Ctrl+Left within one line: back over one run of same-class chars
pub fn prev_word(s: &str, x: usize) -> usize {
    if x <= 1 {
        return 0;
    }
    let chars: Vec<char> = s.chars().collect();
    let mut x = x.min(chars.len()) - 1;
    let class = CharClass::of(chars[x - 1]);
    while x > 0 && CharClass::of(chars[x - 1]) == class {
        x -= 1;
    }
    x
}

/// Ctrl+Right within one line: forward over one run of same-class chars
pub fn next_word(s: &str, x: usize) -> usize {
    let chars: Vec<char> = s.chars().collect();
    if x + 1 >= chars.len() {
        return chars.len();
    }
    let mut x = x + 1;
    let class = CharClass::of(chars[x]);
    while x < chars.len() && CharClass::of(chars[x]) == class {
        x += 1;
    }
    x
}
