//! Visit segmentation.
//!
//! A patient's clinic notes are one long blob in which each visit starts with a date. This
//! module finds those dates and cuts the blob into one span per visit.

use crate::date::parse_date;
use crate::error::PipelineResult;
use chrono::NaiveDate;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Day, separator, month (number or full name), separator, year in 1900..=2099.
static DATE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:[1-9]|0[1-9]|[12][0-9]|3[01])",
        r"(?:\D|\s(?i:de)\s)",
        r"(?:[1-9]|0[1-9]|1[012]|(?i:enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre))",
        r"(?:\D|\s(?i:del?)\s)",
        r"(?:19[0-9]{2}|20[0-9]{2})",
    ))
    .expect("date mention pattern is valid")
});

/// Location of one visit inside the blob it was segmented from.
///
/// Ranges are byte offsets into that blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitSpan {
    pub date: NaiveDate,
    /// The date mention that opens the visit.
    pub token: Range<usize>,
    /// Everything after the date mention up to the next visit's date mention.
    pub body: Range<usize>,
}

impl VisitSpan {
    pub fn token_text<'t>(&self, text: &'t str) -> &'t str {
        &text[self.token.clone()]
    }

    pub fn body_text<'t>(&self, text: &'t str) -> &'t str {
        &text[self.body.clone()]
    }
}

/// Splits `text` into visits, one per distinct consecutive date mention.
///
/// A mention whose date equals the previous visit's date is treated as a restatement and stays
/// inside the previous visit's body. A blob without any date mention yields no visits.
///
/// # Errors
///
/// Returns `PipelineError::InvalidDate` if a detected mention is not a real date
/// (e.g. `31-02-2003`). Segmentation of the blob stops at the first such mention.
pub fn segment(text: &str) -> PipelineResult<Vec<VisitSpan>> {
    let mut boundaries: Vec<(NaiveDate, Range<usize>)> = Vec::new();

    for mention in DATE_MENTION.find_iter(text) {
        let date = parse_date(mention.as_str())?;
        if boundaries.last().is_some_and(|(last, _)| *last == date) {
            tracing::debug!(%date, offset = mention.start(), "repeated date mention kept in current visit");
            continue;
        }
        boundaries.push((date, mention.range()));
    }

    if let Some((_, first)) = boundaries.first() {
        if first.start > 0 {
            tracing::debug!(
                bytes = first.start,
                "text before the first dated visit is not assigned to any visit"
            );
        }
    }

    let body_ends: Vec<usize> = boundaries
        .iter()
        .skip(1)
        .map(|(_, token)| token.start)
        .chain(std::iter::once(text.len()))
        .collect();

    Ok(boundaries
        .into_iter()
        .zip(body_ends)
        .map(|((date, token), end)| VisitSpan {
            date,
            body: token.end..end,
            token,
        })
        .collect())
}

/// Text that precedes the first visit, or the whole text when there are no visits.
pub fn preamble<'t>(text: &'t str, spans: &[VisitSpan]) -> &'t str {
    spans
        .first()
        .map_or(text, |first| &text[..first.token.start])
}
