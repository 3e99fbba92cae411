//! Region grammar: `name` | `name:start` | `name:start-stop`, with tab or colon separators
//! accepted equivalently. String form is 1-based inclusive per SAM convention; the parsed
//! `Region` is 0-based half-open, matching the rest of this crate's internal coordinate system.

use crate::error::{BamError, Result};

/// A resolved genomic interval: reference name plus a half-open, 0-based `[start, stop)` range.
/// `stop` is `None` until resolved against the reference's declared length (an open-ended region
/// string has no stop coordinate of its own).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub start: u32,
    pub stop: Option<u32>,
}

impl Region {
    pub fn new(name: impl Into<String>, start: u32, stop: Option<u32>) -> Self {
        Region {
            name: name.into(),
            start,
            stop,
        }
    }
}

/// Parses a region string of the form `name`, `name:start`, or `name:start-stop`, accepting either
/// `:` or tab as the separator between the reference name and the position spec. Coordinates in
/// the string are 1-based inclusive; the returned `Region` holds 0-based half-open coordinates
/// (`start - 1`, `stop` unchanged since the 1-based-inclusive upper bound equals the
/// 0-based-exclusive one).
pub fn parse_region(input: &str) -> Result<Region> {
    let input = input.trim();
    if input.is_empty() {
        return Err(BamError::DomainError("empty region string".to_string()));
    }

    let Some(sep) = input.find([':', '\t']) else {
        return Ok(Region::new(input, 0, None));
    };
    let name = &input[..sep];
    let rest = &input[sep + 1..];
    if name.is_empty() {
        return Err(BamError::DomainError(format!(
            "malformed region string: {input:?}"
        )));
    }

    // Tab-delimited form gives start/stop as separate fields; colon-delimited form joins them
    // with a hyphen in one field (the SAM convention, "name:start-stop").
    let fields: Vec<&str> = rest.split(['\t', '-']).collect();
    match fields.as_slice() {
        [start] => {
            let start = parse_coord(start)?;
            Ok(Region::new(name, start.saturating_sub(1), None))
        }
        [start, stop] => {
            let start = parse_coord(start)?;
            let stop = parse_coord(stop)?;
            Ok(Region::new(name, start.saturating_sub(1), Some(stop)))
        }
        _ => Err(BamError::DomainError(format!(
            "malformed region string: {input:?}"
        ))),
    }
}

fn parse_coord(s: &str) -> Result<u32> {
    s.parse::<u32>()
        .map_err(|_| BamError::DomainError(format!("not a valid coordinate: {s:?}")))
}
