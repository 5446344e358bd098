//! Small byte helpers.

use std::fmt::Write;

/// Returns true if `key` lies in `[start, end)`.
///
/// An empty `start` sorts before every key, and `None` as `end` is unbounded.
#[must_use]
pub fn is_key_in_domain(key: &[u8], start: &[u8], end: Option<&[u8]>) -> bool {
    if key < start {
        return false;
    }
    end.map_or(true, |end| key < end)
}

/// Formats bytes as uppercase hex without separators.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_in_domain() {
        assert!(is_key_in_domain(b"b", b"a", Some(b"c")));
        assert!(is_key_in_domain(b"a", b"a", Some(b"c")));
        assert!(!is_key_in_domain(b"c", b"a", Some(b"c")));
        assert!(!is_key_in_domain(b"0", b"a", None));
        assert!(is_key_in_domain(b"zzzz", b"", None));
    }

    #[test]
    fn hex_is_uppercase() {
        assert_eq!(to_hex(&[0x00, 0xAB, 0x7f]), "00AB7F");
        assert_eq!(to_hex(b""), "");
    }
}
