//! Parsing of the single-range `Range: bytes=<start>-[<end>]` request header.
//!
//! Only one form is honoured. Every other value (multiple ranges, suffix
//! ranges, other units, garbage) means "no range", and the request is served
//! as a whole file.

use std::ops::RangeInclusive;

use axum::http::{header, HeaderMap};

const BYTES_UNIT: &str = "bytes=";

/// A requested byte interval. `from` is inclusive; `to`, when present, is
/// inclusive too. A missing `to` means "through the end of the file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl ByteRange {
    pub fn new(from: u64, to: Option<u64>) -> Self {
        ByteRange { from, to }
    }

    /// Resolves this range against a body of `size` bytes.
    ///
    /// `to` is clamped to the last byte. Returns `None` when `from` is at or
    /// past the end, which includes every range against an empty body.
    pub fn clamp_to(&self, size: u64) -> Option<RangeInclusive<u64>> {
        if self.from >= size {
            return None;
        }
        let last = size - 1;
        let to = match self.to {
            Some(to) if to < last => to,
            _ => last,
        };
        Some(self.from..=to)
    }
}

/// Parses a raw `Range` header value.
///
/// `None` input means no header was sent. Unsupported values are logged and
/// downgraded to `None`, never rejected.
pub fn parse_range_header(value: Option<&str>) -> Option<ByteRange> {
    let value = value?;

    let Some(spec) = value.strip_prefix(BYTES_UNIT) else {
        tracing::warn!(range = value, "not implemented: parsing Range header");
        return None;
    };

    let parsed = spec.split_once('-').and_then(|(start, end)| {
        let from = parse_digits(start)?;
        let to = if end.is_empty() {
            None
        } else {
            Some(parse_digits(end)?)
        };
        Some(ByteRange::new(from, to))
    });

    match parsed {
        Some(ByteRange { from, to: Some(to) }) if to < from => {
            tracing::warn!(range = value, "Range header ends before it starts, ignoring");
            None
        }
        Some(range) => Some(range),
        None => {
            tracing::warn!(range = value, "cannot parse Range header");
            None
        }
    }
}

/// Extracts and parses the `Range` header from a request's header map.
pub fn range_from_headers(headers: &HeaderMap) -> Option<ByteRange> {
    let value = headers.get(header::RANGE)?;
    match value.to_str() {
        Ok(value) => parse_range_header(Some(value)),
        Err(_) => {
            tracing::warn!(range = ?value, "Range header is not visible ASCII, ignoring");
            None
        }
    }
}

// `u64::from_str` also accepts a leading `+`, which is not a DIGIT
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
