//! Text-to-record pipeline.
//!
//! Composes patient normalisation, visit segmentation and instrument block extraction. The
//! pipeline is synchronous and holds no mutable state, so one instance can serve any number of
//! patients, including from several threads at once.

use crate::error::PipelineResult;
use crate::measurement::{MeasurementExtractor, RefractionExtractor, TonometryExtractor};
use crate::patient::{PatientNormalizer, RawPatient};
use crate::segment::segment;
use crate::text::{clean_clinic_text, collapse_whitespace};
use chrono::NaiveDate;
use oftalmo_types::{Patient, Visit};

#[derive(Debug, Default)]
pub struct Pipeline {
    normalizer: PatientNormalizer,
    tonometry: TonometryExtractor,
    refraction: RefractionExtractor,
}

impl Pipeline {
    pub fn new(normalizer: PatientNormalizer) -> Self {
        Self {
            normalizer,
            tonometry: TonometryExtractor,
            refraction: RefractionExtractor,
        }
    }

    /// Builds a patient with its visits from a legacy row and its clinic note rows.
    ///
    /// Visits of every clinic row are concatenated in row order.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` if the row cannot be normalised and
    /// `PipelineError::InvalidDate` if any clinic row contains an unparseable date mention.
    pub fn run<S: AsRef<str>>(&self, raw: &RawPatient, clinic_rows: &[S]) -> PipelineResult<Patient> {
        let mut patient = self.normalizer.normalize(raw)?;
        for row in clinic_rows {
            patient.visits.extend(self.parse_visits(row.as_ref())?);
        }
        Ok(patient)
    }

    /// Segments one clinic note blob into visits and extracts their instrument blocks.
    pub fn parse_visits(&self, blob: &str) -> PipelineResult<Vec<Visit>> {
        let text = clean_clinic_text(blob);
        let spans = segment(&text)?;
        tracing::debug!(visits = spans.len(), "segmented clinic notes");

        Ok(spans
            .iter()
            .map(|span| self.visit_from(span.date, span.body_text(&text)))
            .collect())
    }

    /// Tonometry first, then refraction on what tonometry left behind.
    fn visit_from(&self, date: NaiveDate, body: &str) -> Visit {
        let tonometry = self.tonometry.extract(body);
        let refraction = self.refraction.extract(&tonometry.residual);

        let mut visit = Visit::new(date, collapse_whitespace(&refraction.residual).trim());
        visit.tonometry = tonometry.value;
        visit.donder = refraction.value;
        visit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FIELD_CODE, FIELD_NAME};
    use crate::error::PipelineError;
    use crate::patient::AllowList;
    use chrono::NaiveTime;
    use oftalmo_types::TonometryReading;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn parses_visits_with_tonometry() {
        let blob = "15-01-2003 Paciente estable. TONOMETRIA Fecha 15-01-2003 Hora 10:30 PIO OD 16 PIO OI 15 20-01-2003 Revision.";
        let visits = Pipeline::default().parse_visits(blob).expect("parse");

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].date, ymd(2003, 1, 15));
        assert_eq!(visits[0].clinic, "Paciente estable.");
        assert_eq!(
            visits[0].tonometry,
            vec![TonometryReading {
                time: NaiveTime::from_hms_opt(10, 30, 0).expect("valid time"),
                od: 16,
                oi: 15,
            }]
        );
        assert_eq!(visits[1].date, ymd(2003, 1, 20));
        assert_eq!(visits[1].clinic, "Revision.");
        assert!(visits[1].tonometry.is_empty());
    }

    #[test]
    fn extracts_refraction_after_tonometry() {
        let blob = "2-3-2004 Graduacion. uTONOMETRIAu Fecha 2-3-2004 Hora 9:05 PIO OD 21 PIO OI 19 \
                    uDONDERSu AV ESF VL CIL EJE AV ESF VP AV uOD 0.5 -1.25 -0.50 90=0.9 -1.00 1.0u \
                    uOI 0.4 -1.50 -0.75 85=0.8 -1.25 0.9u Gafas nuevas.";
        let visits = Pipeline::default().parse_visits(blob).expect("parse");

        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].tonometry.len(), 1);
        let donder = visits[0].donder.as_ref().expect("refraction block");
        assert_eq!(donder.od.sphere, Some(-1.25));
        assert_eq!(donder.oi.axis, Some(85.0));
        assert_eq!(visits[0].clinic, "Graduacion. Gafas nuevas.");
    }

    #[test]
    fn cleans_whitespace_and_accents_before_segmenting() {
        let blob = "  7 de Julio del 2004\n\nRevisión\tdel  fondo de ojo.\r\n";
        let visits = Pipeline::default().parse_visits(blob).expect("parse");

        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].date, ymd(2004, 7, 7));
        assert_eq!(visits[0].clinic, "Revision del fondo de ojo.");
    }

    #[test]
    fn uppercase_prose_dates_open_visits() {
        let blob = "15 DE ENERO DE 2003 Consulta inicial. 20 De Febrero De 2003 Control.";
        let visits = Pipeline::default().parse_visits(blob).expect("parse");

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].date, ymd(2003, 1, 15));
        assert_eq!(visits[0].clinic, "Consulta inicial.");
        assert_eq!(visits[1].date, ymd(2003, 2, 20));
        assert_eq!(visits[1].clinic, "Control.");
    }

    #[test]
    fn single_digit_minute_tonometry_is_extracted() {
        let blob = "15-01-2003 Nota. TONOMETRIA Fecha 15-01-2003 Hora 9:5 PIO OD 16 PIO OI 15";
        let visits = Pipeline::default().parse_visits(blob).expect("parse");

        assert_eq!(visits.len(), 1);
        assert_eq!(
            visits[0].tonometry,
            vec![TonometryReading {
                time: NaiveTime::from_hms_opt(9, 5, 0).expect("valid time"),
                od: 16,
                oi: 15,
            }]
        );
        assert_eq!(visits[0].clinic, "Nota.");
    }

    #[test]
    fn blob_without_dates_yields_no_visits() {
        let visits = Pipeline::default()
            .parse_visits("Notas sin fecha.")
            .expect("parse");
        assert!(visits.is_empty());
    }

    #[test]
    fn run_concatenates_visits_of_every_clinic_row() {
        let raw = RawPatient::new()
            .with(FIELD_CODE, "88")
            .with(FIELD_NAME, "Peña, Lucía");
        let rows = ["1-1-2001 Primera.", "2-2-2002 Segunda. 3-3-2003 Tercera."];

        let patient = Pipeline::default().run(&raw, &rows).expect("run");

        assert_eq!(patient.surname.as_str(), "Pena");
        assert_eq!(patient.name.as_str(), "Lucia");
        let dates: Vec<NaiveDate> = patient.visits.iter().map(|v| v.date).collect();
        assert_eq!(dates, vec![ymd(2001, 1, 1), ymd(2002, 2, 2), ymd(2003, 3, 3)]);
    }

    #[test]
    fn run_surfaces_invalid_dates() {
        let raw = RawPatient::new()
            .with(FIELD_CODE, "88")
            .with(FIELD_NAME, "Ruiz, Ana");

        let err = Pipeline::default()
            .run(&raw, &["30-02-2003 Imposible."])
            .expect_err("invalid date");
        assert!(matches!(err, PipelineError::InvalidDate { .. }));
    }

    #[test]
    fn run_surfaces_validation_before_parsing_notes() {
        let pipeline = Pipeline::new(PatientNormalizer::new(AllowList::new(["ONCE"])));
        let raw = RawPatient::new()
            .with(FIELD_CODE, "88")
            .with(FIELD_NAME, "Ruiz, Ana")
            .with("NOMBRE", "OTRA");

        let err = pipeline
            .run(&raw, &["30-02-2003 Imposible."])
            .expect_err("rejected company");
        assert!(matches!(err, PipelineError::Validation { input, .. } if input == "OTRA"));
    }
}
