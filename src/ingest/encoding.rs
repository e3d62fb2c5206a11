//! Character encoding detection for delimited input files.
//!
//! Detection only ever looks at a bounded prefix of the file, so opening a
//! multi-gigabyte export stays cheap. Windows-1252 decodes every byte
//! sequence, which makes the fallback total: a retry with it cannot fail.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// How many leading bytes the detector inspects.
pub const SNIFF_LEN: usize = 100_000;

/// Guesses the encoding of a file from a sample of its first bytes.
///
/// A byte order mark wins outright; otherwise the sample is checked for
/// UTF-8 validity, tolerating a multi-byte character cut off at the sample
/// edge. Anything else is treated as Windows-1252.
pub fn detect(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => UTF_8,
        // error_len of None means the sample ended mid-character, which a
        // truncated view of valid UTF-8 will do.
        Err(err) if err.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Decodes the full file with the detected encoding, retrying with
/// Windows-1252 when the primary decode reports malformed sequences.
/// Returns the text and the encoding that finally applied.
pub fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> (Cow<'a, str>, &'static Encoding) {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors && used != WINDOWS_1252 {
        let (retry, _, _) = WINDOWS_1252.decode(bytes);
        return (retry, WINDOWS_1252);
    }
    (text, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_utf8() {
        assert_eq!(detect(b"InvoiceNo,Description\n1,WHITE LANTERN\n"), UTF_8);
    }

    #[test]
    fn multibyte_utf8_is_utf8() {
        assert_eq!(detect("id,note\n1,caf\u{e9}\n".as_bytes()), UTF_8);
    }

    #[test]
    fn sample_cut_mid_character_still_reads_as_utf8() {
        let text = "id,note\n1,caf\u{e9}";
        let bytes = text.as_bytes();
        // Slice off the last byte of the two-byte é.
        assert_eq!(detect(&bytes[..bytes.len() - 1]), UTF_8);
    }

    #[test]
    fn latin1_bytes_fall_back_to_windows_1252() {
        let bytes = b"id,note\n1,caf\xe9\n";
        assert_eq!(detect(bytes), WINDOWS_1252);
        let (text, used) = decode(bytes, detect(bytes));
        assert_eq!(used, WINDOWS_1252);
        assert!(text.contains("caf\u{e9}"));
    }

    #[test]
    fn bom_wins_and_is_stripped_on_decode() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"id\n1\n");
        assert_eq!(detect(&bytes), UTF_8);
        let (text, _) = decode(&bytes, UTF_8);
        assert!(text.starts_with("id"));
    }

    #[test]
    fn dirty_tail_past_the_sample_triggers_the_retry() {
        // The sample sees clean ASCII, but the full file holds a raw
        // Latin-1 byte further down.
        let bytes = b"id,note\n1,plain\n2,caf\xe9\n";
        let (text, used) = decode(bytes, UTF_8);
        assert_eq!(used, WINDOWS_1252);
        assert!(text.contains("caf\u{e9}"));
    }
}
