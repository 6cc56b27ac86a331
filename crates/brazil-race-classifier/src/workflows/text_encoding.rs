use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Encoding of every TSE CSV export.
pub fn tse_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Resolves labels such as `latin-1`, `iso-8859-1` or `utf-8`.
pub fn resolve(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    if matches!(
        label.to_ascii_lowercase().as_str(),
        "latin1" | "latin-1" | "latin_1"
    ) {
        return Some(WINDOWS_1252);
    }
    Encoding::for_label(label.as_bytes())
}

pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Characters the target encoding cannot represent become numeric character
/// references, which is what encoding_rs does for legacy encodings.
pub fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_labels() {
        assert_eq!(resolve("latin-1"), Some(WINDOWS_1252));
        assert_eq!(resolve("LATIN1"), Some(WINDOWS_1252));
        assert_eq!(resolve(" utf-8 "), Some(UTF_8));
        assert!(resolve("klingon").is_none());
    }

    #[test]
    fn latin1_roundtrips_portuguese_text() {
        let bytes = encode("JOSÉ DA CONCEIÇÃO", tse_encoding());
        assert_eq!(bytes.len(), "JOSÉ DA CONCEIÇÃO".chars().count());
        assert_eq!(decode(&bytes, tse_encoding()), "JOSÉ DA CONCEIÇÃO");
    }
}
