use super::{without_ranges, Extracted, MeasurementExtractor};
use oftalmo_types::{EyeRefraction, RefractionBlock};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// The refractometer's "donders" printout.
///
/// Columns per eye are uncorrected acuity, sphere, cylinder, axis, `=`, corrected acuity,
/// corrected sphere, final acuity. Any cell may be blank. The `u` markers are folded box
/// characters around the eye labels.
static DONDERS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    const CELL: &str = r"([-+]?[0-9]*\.?[0-9]*)";
    let eye = |label: &str| format!("u?{label} {CELL} {CELL} {CELL} {CELL}={CELL} {CELL} {CELL}u?");
    let pattern = format!(
        "u?DONDERSu? AV ESF VL CIL EJE AV ESF VP AV {} {}",
        eye("OD"),
        eye("OI")
    );
    Regex::new(&pattern).expect("donders pattern is valid")
});

/// Pulls the first refraction block out of a visit's notes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefractionExtractor;

impl MeasurementExtractor for RefractionExtractor {
    type Output = Option<RefractionBlock>;

    fn extract(&self, text: &str) -> Extracted<Option<RefractionBlock>> {
        let Some(caps) = DONDERS_BLOCK.captures(text) else {
            return Extracted {
                value: None,
                residual: text.to_string(),
            };
        };
        let Some(block) = caps.get(0) else {
            return Extracted {
                value: None,
                residual: text.to_string(),
            };
        };

        Extracted {
            value: Some(RefractionBlock {
                od: eye_from(&caps, 1),
                oi: eye_from(&caps, 8),
            }),
            residual: without_ranges(text, &[block.range()]),
        }
    }
}

/// Reads the seven cells of one eye starting at capture group `first`.
fn eye_from(caps: &Captures<'_>, first: usize) -> EyeRefraction {
    let cell = |offset: usize| {
        caps.get(first + offset)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
    };
    EyeRefraction {
        uncorrected_acuity: cell(0),
        sphere: cell(1),
        cylinder: cell(2),
        axis: cell(3),
        corrected_acuity: cell(4),
        corrected_sphere: cell(5),
        final_acuity: cell(6),
    }
}
