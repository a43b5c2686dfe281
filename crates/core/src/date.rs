//! Date token parsing.
//!
//! Clinic notes mention dates in three ways:
//! - prose: `15 de Enero de 2003`, `15 de Enero del 2003`, `15 de Enero 2003`
//! - hyphenated: `15-01-2003`
//! - separated by whitespace or other punctuation: `15 01 2003`, `15/01/2003`
//!
//! All three are day-first. Months may be numeric or a Spanish month name.

use crate::constants::{MONTH_ABBREVIATIONS, MONTH_NAMES};
use crate::error::{PipelineError, PipelineResult};
use crate::text::fold_diacritics;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// The `de` / `del` connector words of the prose form.
static PROSE_CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdel?\b").expect("prose connector pattern is valid"));

/// Syntax of a date token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateSyntax {
    /// `<day> de <month> de[l] <year>`.
    Prose,
    /// `<day>-<month>-<year>`.
    Hyphenated,
    /// Components separated by whitespace or any other punctuation.
    Separated,
}

impl DateSyntax {
    /// Classifies a token. A `de` connector wins over hyphens when both appear.
    pub fn classify(token: &str) -> Self {
        if PROSE_CONNECTOR.is_match(token) {
            DateSyntax::Prose
        } else if token.contains('-') {
            DateSyntax::Hyphenated
        } else {
            DateSyntax::Separated
        }
    }
}

/// Parses a single date token into a calendar date.
///
/// # Errors
///
/// Returns `PipelineError::InvalidDate` carrying the token if it does not split into exactly
/// day, month and year, if the day or year is not numeric, if the month is neither a number
/// in `1..=12` nor a known month name, or if the combination is not a real date.
pub fn parse_date(token: &str) -> PipelineResult<NaiveDate> {
    let [day, month, year] = match DateSyntax::classify(token) {
        DateSyntax::Prose => prose_components(token)?,
        DateSyntax::Hyphenated => exactly_three(token, token.split('-').map(str::trim).collect())?,
        DateSyntax::Separated => exactly_three(
            token,
            token
                .split(|c: char| !c.is_alphanumeric())
                .filter(|s| !s.is_empty())
                .collect(),
        )?,
    };

    let day_number: u32 = day
        .parse()
        .map_err(|_| PipelineError::invalid_date(token, format!("non-numeric day {day:?}")))?;
    let month_value = month_number(month).ok_or_else(|| {
        PipelineError::invalid_date(token, format!("unrecognised month {month:?}"))
    })?;
    let year_number: i32 = year
        .parse()
        .map_err(|_| PipelineError::invalid_date(token, format!("non-numeric year {year:?}")))?;

    NaiveDate::from_ymd_opt(year_number, month_value, day_number)
        .ok_or_else(|| PipelineError::invalid_date(token, "not a calendar date"))
}

/// Resolves a month component: a number in `1..=12`, a full Spanish month name or a common
/// abbreviation. Names are matched case-insensitively and without accents.
pub fn month_number(component: &str) -> Option<u32> {
    let component = component.trim().trim_end_matches('.');
    if let Ok(number) = component.parse::<u32>() {
        return (1..=12).contains(&number).then_some(number);
    }

    let folded = fold_diacritics(component).to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| *name == folded)
        .map(|index| index as u32 + 1)
        .or_else(|| {
            MONTH_ABBREVIATIONS
                .iter()
                .find(|(abbreviation, _)| *abbreviation == folded)
                .map(|(_, number)| *number)
        })
}

fn exactly_three<'a>(token: &str, parts: Vec<&'a str>) -> PipelineResult<[&'a str; 3]> {
    match parts.as_slice() {
        [day, month, year] => Ok([*day, *month, *year]),
        parts if parts.len() < 3 => Err(PipelineError::invalid_date(
            token,
            "fewer than three components",
        )),
        _ => Err(PipelineError::invalid_date(token, "more than three components")),
    }
}

/// Splits a prose token on its connectors.
///
/// The month segment may run on into the year when the second connector is missing
/// (`15 de Enero 2003`); its last word is then the year. Anything more ambiguous than a single
/// trailing word is rejected rather than guessed.
fn prose_components(token: &str) -> PipelineResult<[&str; 3]> {
    let fewer = || PipelineError::invalid_date(token, "fewer than three components");

    let segments: Vec<&str> = PROSE_CONNECTOR
        .split(token)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let (&day, rest) = segments.split_first().ok_or_else(fewer)?;
    let (&month_segment, tail) = rest.split_first().ok_or_else(fewer)?;

    let mut words = month_segment.split_whitespace();
    let month = words.next().ok_or_else(fewer)?;
    let overflow: Vec<&str> = words.collect();

    let year = match (overflow.as_slice(), tail) {
        ([], [year]) => *year,
        ([year], []) => *year,
        ([], []) => return Err(fewer()),
        _ => {
            return Err(PipelineError::invalid_date(
                token,
                "ambiguous trailing components",
            ))
        }
    };

    Ok([day, month, year])
}
