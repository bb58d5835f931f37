//! The COMET2 character set is JIS X 0201: the printable ASCII range (with
//! the yen sign in place of the backslash and an overline in place of the
//! tilde) plus half-width katakana.

/// Converts a single character to its 8-bit JIS X 0201 code.
/// Returns None if the character has no representation.
pub fn to_code(c: char) -> Option<u8> {
    match c {
        '¥' => Some(0x5C),
        '‾' => Some(0x7E),
        ' '..='~' => Some(c as u8),
        // Half-width katakana block: U+FF61..U+FF9F => 0xA1..0xDF
        '\u{FF61}'..='\u{FF9F}' => Some((c as u32 - 0xFF61 + 0xA1) as u8),
        _ => None,
    }
}

/// Undoes the `''` escaping of a string constant body (the text between
/// the outer quotes). Returns None if a lone quote remains.
pub fn unescape_quotes(body: &str) -> Option<String> {
    if body.replace("''", "").contains('\'') {
        return None;
    }
    Some(body.replace("''", "'"))
}
