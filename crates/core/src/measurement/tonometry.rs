use super::{without_ranges, Extracted, MeasurementExtractor};
use chrono::NaiveTime;
use oftalmo_types::TonometryReading;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `TONOMETRIA Fecha d-m-y Hora hh:mm PIO OD n PIO OI n`.
///
/// The keyword may be wrapped in `u` markers, which is what the instrument's box-drawing
/// characters became after diacritic folding.
static TONOMETRY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"u?TONOMETRIAu?\s+Fecha\s+\d+\D\d+\D\d+",
        r"\s+Hora\s+(?P<hour>\d{1,2}):(?P<minute>\d{1,2})",
        r"\s+PIO\s+OD\s+(?P<od>\d+)\s+PIO\s+OI\s+(?P<oi>\d+)",
    ))
    .expect("tonometry pattern is valid")
});

/// Pulls every tonometry block out of a visit's notes, in text order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TonometryExtractor;

impl MeasurementExtractor for TonometryExtractor {
    type Output = Vec<TonometryReading>;

    fn extract(&self, text: &str) -> Extracted<Vec<TonometryReading>> {
        let mut readings = Vec::new();
        let mut consumed = Vec::new();

        for caps in TONOMETRY_BLOCK.captures_iter(text) {
            let Some(block) = caps.get(0) else {
                continue;
            };
            match reading_from(&caps) {
                Some(reading) => {
                    readings.push(reading);
                    consumed.push(block.range());
                }
                None => tracing::warn!(
                    block = block.as_str(),
                    "tonometry block with out-of-range values left in notes"
                ),
            }
        }

        Extracted {
            value: readings,
            residual: without_ranges(text, &consumed),
        }
    }
}

fn reading_from(caps: &Captures<'_>) -> Option<TonometryReading> {
    let hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = caps["minute"].parse().ok()?;
    Some(TonometryReading {
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        od: caps["od"].parse().ok()?,
        oi: caps["oi"].parse().ok()?,
    })
}
