//! `Range` / `Content-Range` header handling for resumed transfers.

/// A satisfied `Content-Range: bytes <start>-<end>/<total>` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    /// Inclusive.
    pub end:   u64,
    /// `None` when the server answered `*` for the complete length.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Number of bytes the range covers.
    pub fn length(&self) -> u64 { self.end - self.start + 1 }
}

/// `Range` request header value asking for everything from `offset` on.
pub fn range_header(offset: u64) -> String { format!("bytes={offset}-") }

/// Parse a satisfied `Content-Range` value.
///
/// Returns `None` for anything malformed or internally inconsistent.
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;

    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    let total = match total.trim() {
        "*" => None,
        n => Some(n.parse::<u64>().ok()?),
    };

    if end < start || total.is_some_and(|t| end >= t) {
        return None;
    }
    Some(ContentRange { start, end, total })
}

/// Parse the complete length from an unsatisfied `Content-Range: bytes */<total>`.
pub fn parse_unsatisfied_range(value: &str) -> Option<u64> {
    value.trim().strip_prefix("bytes */")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_header() {
        assert_eq!(range_header(0), "bytes=0-");
        assert_eq!(range_header(400), "bytes=400-");
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(
            parse_content_range("bytes 400-999/1000"),
            Some(ContentRange {
                start: 400,
                end:   999,
                total: Some(1000),
            })
        );
        assert_eq!(
            parse_content_range("bytes 0-9/*"),
            Some(ContentRange {
                start: 0,
                end:   9,
                total: None,
            })
        );
        assert_eq!(parse_content_range("bytes 400-999/1000").map(|r| r.length()), Some(600));
    }

    #[test]
    fn test_parse_content_range_rejects_malformed() {
        for bad in [
            "",
            "bytes",
            "bytes 5-4/10",
            "bytes 0-10/10",
            "items 0-9/10",
            "bytes -9/10",
            "bytes */10",
            "bytes 0-9/abc",
        ] {
            assert_eq!(parse_content_range(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_parse_unsatisfied_range() {
        assert_eq!(parse_unsatisfied_range("bytes */1000"), Some(1000));
        assert_eq!(parse_unsatisfied_range("bytes 0-9/1000"), None);
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "\\PC*") {
            let _ = parse_content_range(&s);
            let _ = parse_unsatisfied_range(&s);
        }

        #[test]
        fn parsed_ranges_are_consistent(start in 0u64..1 << 40, len in 1u64..1 << 20, slack in 0u64..1 << 20) {
            let end = start + len - 1;
            let total = end + 1 + slack;
            let parsed = parse_content_range(&format!("bytes {start}-{end}/{total}")).unwrap();
            prop_assert_eq!(parsed.length(), len);
            prop_assert!(parsed.total.is_some_and(|t| parsed.end < t));
        }
    }
}
