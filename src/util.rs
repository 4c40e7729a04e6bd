//! Internal helpers.

/// Lowercase hex rendering for log output (engine identifiers, digests).
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_renders() {
        assert_eq!(hex(&[0x80, 0x00, 0x1F, 0x88]), "80001f88");
        assert_eq!(hex(&[]), "");
    }
}
