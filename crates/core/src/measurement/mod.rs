//! Instrument block extraction.
//!
//! Tonometers and refractometers printed fixed-format blocks that were pasted into the clinic
//! notes. Each extractor recognises one block type, parses it and hands back the notes with the
//! block cut out. Not finding a block is a normal outcome, never an error.

mod refraction;
mod tonometry;

pub use refraction::RefractionExtractor;
pub use tonometry::TonometryExtractor;

use std::ops::Range;

/// Result of running an extractor over a visit's notes.
#[derive(Clone, Debug, PartialEq)]
pub struct Extracted<T> {
    pub value: T,
    /// The input with every consumed block removed.
    pub residual: String,
}

/// A block extractor over a visit's text.
pub trait MeasurementExtractor {
    type Output;

    fn extract(&self, text: &str) -> Extracted<Self::Output>;
}

/// Copies `text` leaving out the given ranges, which must be sorted and non-overlapping.
fn without_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut residual = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        residual.push_str(&text[cursor..range.start]);
        cursor = range.end;
    }
    residual.push_str(&text[cursor..]);
    residual
}
