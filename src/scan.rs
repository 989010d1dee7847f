//! Integer extraction from loosely structured response text.
//!
//! The settings endpoint is read as plain text and scanned for markers such as
//! `led":`; anything after the marker that parses as a signed decimal is taken.
//! A missing marker is `None`, never a numeric stand-in.

/// Integer directly following the first occurrence of `key`.
pub fn find_int_after(buf: &str, key: &str) -> Option<i16> {
    let start = buf.find(key)? + key.len();
    parse_leading_int(&buf[start..])
}

/// Integer following `inner` inside the block opened by the first `outer`.
///
/// The block ends at the first closing brace, so a key missing from one block
/// is never picked up from the next.
pub fn find_int_after_within(buf: &str, outer: &str, inner: &str) -> Option<i16> {
    let start = buf.find(outer)? + outer.len();
    let rest = &buf[start..];
    let block = &rest[..rest.find('}').unwrap_or(rest.len())];
    find_int_after(block, inner)
}

fn parse_leading_int(s: &str) -> Option<i16> {
    let s = s.trim_start_matches([' ', '\t', '\r', '\n']);
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i32 = digits[..end].parse().ok()?;
    let value = if negative { -value } else { value };
    i16::try_from(value).ok()
}
