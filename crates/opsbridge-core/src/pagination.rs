//! Opaque cursor pagination
//!
//! Every list-style tool pages through a listing that is recomputed from the
//! backend on each call. A cursor carries only the offset of the next item, so
//! pages are not a stable snapshot: if the underlying resource changes between
//! calls, items may shift, repeat, or be skipped.
//!
//! Decoding never fails. An empty or malformed cursor restarts at offset 0.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

/// Page size used when the caller asks for zero items
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on a single page
pub const MAX_PAGE_SIZE: usize = 500;

const CURSOR_PREFIX: &str = "offset:";

/// Encode an offset into an opaque continuation token
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}{}", CURSOR_PREFIX, offset))
}

/// Decode a continuation token back into an offset, falling back to 0
pub fn decode_cursor(token: &str) -> usize {
    if token.is_empty() {
        return 0;
    }

    let offset = URL_SAFE_NO_PAD
        .decode(token.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| {
            text.strip_prefix(CURSOR_PREFIX)
                .and_then(|digits| digits.parse::<usize>().ok())
        });

    match offset {
        Some(offset) => offset,
        None => {
            debug!("Ignoring malformed pagination cursor: {:?}", token);
            0
        }
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`
pub fn normalize_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

/// One window of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Offset of the first item in `items`
    pub offset: usize,
    /// Size of the full listing this page was cut from
    pub total: usize,
    pub has_more: bool,
    pub remaining_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Cut the `[start, start + limit)` window out of a freshly computed listing
pub fn paginate<T>(items: Vec<T>, cursor: Option<&str>, limit: usize) -> Page<T> {
    let limit = normalize_limit(limit);
    let total = items.len();
    let start = cursor.map(decode_cursor).unwrap_or(0).min(total);
    let end = start.saturating_add(limit).min(total);

    let window: Vec<T> = items.into_iter().skip(start).take(end - start).collect();
    let has_more = end < total;

    Page {
        items: window,
        offset: start,
        total,
        has_more,
        remaining_count: total - end,
        next_cursor: has_more.then(|| encode_cursor(end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encoded_offsets() {
        for offset in [0, 1, 49, 50, 1_000, 123_456_789, usize::MAX] {
            assert_eq!(decode_cursor(&encode_cursor(offset)), offset);
        }
    }

    #[test]
    fn test_empty_cursor_is_zero() {
        assert_eq!(decode_cursor(""), 0);
    }

    #[test]
    fn test_malformed_cursor_is_zero() {
        assert_eq!(decode_cursor("garbage"), 0);
        assert_eq!(decode_cursor("!!!not base64!!!"), 0);
        // valid base64, wrong payload
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("offset:-5")), 0);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("page=3")), 0);
        assert_eq!(
            decode_cursor(&URL_SAFE_NO_PAD.encode("offset:99999999999999999999999999")),
            0
        );
    }

    #[test]
    fn test_cursor_is_opaque() {
        let token = encode_cursor(20);
        assert!(!token.contains("20"));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_paginate_walks_whole_listing() {
        let listing: Vec<u32> = (0..7).collect();
        let mut cursor: Option<String> = None;
        let mut seen = Vec::new();
        let mut pages = 0;

        loop {
            let page = paginate(listing.clone(), cursor.as_deref(), 3);
            pages += 1;
            seen.extend(page.items.iter().copied());
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                assert_eq!(page.remaining_count, 0);
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(pages, 3);
        assert_eq!(seen, listing);
    }

    #[test]
    fn test_paginate_counts() {
        let page = paginate((0..10).collect::<Vec<_>>(), None, 4);
        assert_eq!(page.items, vec![0, 1, 2, 3]);
        assert_eq!(page.total, 10);
        assert!(page.has_more);
        assert_eq!(page.remaining_count, 6);
        assert_eq!(page.next_cursor.as_deref().map(decode_cursor), Some(4));
    }

    #[test]
    fn test_paginate_offset_past_end() {
        let cursor = encode_cursor(100);
        let page = paginate(vec!["a", "b"], Some(&cursor), 10);
        assert!(page.items.is_empty());
        assert_eq!(page.offset, 2);
        assert!(!page.has_more);
        assert_eq!(page.remaining_count, 0);
    }

    #[test]
    fn test_paginate_huge_offset_does_not_overflow() {
        let cursor = encode_cursor(usize::MAX);
        let page = paginate(vec![1, 2, 3], Some(&cursor), MAX_PAGE_SIZE);
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn test_paginate_bad_cursor_restarts() {
        let page = paginate(vec![1, 2, 3], Some("garbage"), 2);
        assert_eq!(page.offset, 0);
        assert_eq!(page.items, vec![1, 2]);
    }

    #[test]
    fn test_normalize_limit() {
        assert_eq!(normalize_limit(0), DEFAULT_PAGE_SIZE);
        assert_eq!(normalize_limit(7), 7);
        assert_eq!(normalize_limit(MAX_PAGE_SIZE + 1), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page = paginate(vec![1, 2, 3], None, 2);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["remainingCount"], 1);
        assert!(json["nextCursor"].is_string());
    }
}
