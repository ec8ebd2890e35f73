//! Best-effort `| name = value` lookup over raw wikitext.
//!
//! The scan is not scoped to any particular template: a key is matched wherever a
//! `|` introduces it, including inside nested templates.

use crate::content::clean_wiki;

/// Returns the cleaned value of the first alias present as a template parameter.
///
/// Aliases are tried in the given order and matched case-insensitively; the first
/// alias that appears wins even if its value cleans to an empty string.
pub fn extract_field(text: &str, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| find_raw_value(text, alias))
        .map(clean_wiki)
}

/// Raw, uncleaned value slice for a single key.
pub fn find_raw_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = find_pipe(&bytes[search_from..]) {
        let pipe = search_from + offset;
        if let Some(value_start) = match_key(bytes, pipe + 1, key.as_bytes()) {
            let value_end = find_value_end(bytes, value_start);
            return Some(text[value_start..value_end].trim());
        }
        search_from = pipe + 1;
    }
    None
}

fn find_pipe(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == b'|')
}

/// Matches `\s* key \s* = \s*` at `pos`, returning where the value begins.
fn match_key(bytes: &[u8], pos: usize, key: &[u8]) -> Option<usize> {
    let mut i = skip_whitespace(bytes, pos);
    if i + key.len() > bytes.len() {
        return None;
    }
    // Byte-wise ASCII folding keeps offsets valid for non-ASCII keys and text.
    if !bytes[i..i + key.len()]
        .iter()
        .zip(key.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
    {
        return None;
    }
    i = skip_whitespace(bytes, i + key.len());
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    Some(skip_whitespace(bytes, i + 1))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// A value runs until a `|` or `}}` outside any `{{ }}` / `[[ ]]` opened within it.
fn find_value_end(bytes: &[u8], start: usize) -> usize {
    let mut braces: u32 = 0;
    let mut brackets: u32 = 0;
    let mut i = start;

    while i < bytes.len() {
        let pair = i + 1 < bytes.len();
        if pair && bytes[i] == b'{' && bytes[i + 1] == b'{' {
            braces += 1;
            i += 2;
        } else if pair && bytes[i] == b'}' && bytes[i + 1] == b'}' {
            if braces == 0 {
                return i;
            }
            braces -= 1;
            i += 2;
        } else if pair && bytes[i] == b'[' && bytes[i + 1] == b'[' {
            brackets += 1;
            i += 2;
        } else if pair && bytes[i] == b']' && bytes[i + 1] == b']' {
            brackets = brackets.saturating_sub(1);
            i += 2;
        } else if bytes[i] == b'|' && braces == 0 && brackets == 0 {
            return i;
        } else {
            i += 1;
        }
    }
    bytes.len()
}
