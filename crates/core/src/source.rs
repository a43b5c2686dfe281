//! Source and sink contracts of the migration, with file-backed implementations.
//!
//! The legacy store is read through [`PatientSource`] (patient rows and clinic notes) and
//! [`VisitDetailSource`] (per-visit detail tables). Migrated patients are handed to a
//! [`RecordSink`]. [`JsonExport`] reads a JSON dump of the legacy tables; [`YamlDirectorySink`]
//! writes one YAML document per patient.

use crate::constants::PATIENT_FILE_EXTENSION;
use crate::enrich::{DetailCategory, VisitDetail, VisitDetailSource};
use crate::error::{MigrationError, MigrationResult};
use crate::patient::RawPatient;
use crate::text::fold_diacritics;
use crate::validation::validate_code_safe_for_file_name;
use chrono::{NaiveDate, NaiveTime, Timelike};
use oftalmo_types::{Optometric, Patient, TonometryReading, VisitRecord};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Read side of the legacy patient store.
pub trait PatientSource {
    /// Every row of the legacy patient table.
    fn patients(&self) -> MigrationResult<Vec<RawPatient>>;

    /// Clinic note rows for one patient, in storage order.
    fn clinic_rows(&self, code: &str) -> MigrationResult<Vec<String>>;
}

/// Write side of the migration.
pub trait RecordSink {
    fn persist(&mut self, patient: &Patient) -> MigrationResult<()>;
}

// ============================================================================
// JSON export
// ============================================================================

/// JSON dump of the legacy tables.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyExport {
    #[serde(default)]
    patients: Vec<RawPatient>,
    /// Clinic note rows keyed by patient code.
    #[serde(default)]
    clinic: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    tonometry: Vec<TonometryRow>,
    #[serde(default)]
    records: Vec<RecordRow>,
    #[serde(default)]
    optometrics: Vec<OptometricRow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TonometryRow {
    #[serde(deserialize_with = "code_text")]
    code: String,
    date: NaiveDate,
    time: String,
    od: u16,
    oi: u16,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordRow {
    #[serde(deserialize_with = "code_text")]
    code: String,
    date: NaiveDate,
    title: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptometricRow {
    #[serde(deserialize_with = "code_text")]
    code: String,
    date: NaiveDate,
    #[serde(default)]
    right_eye: Option<String>,
    #[serde(default)]
    left_eye: Option<String>,
    #[serde(default)]
    right_eye_sc: Option<String>,
    #[serde(default)]
    left_eye_sc: Option<String>,
}

/// Patient codes were numeric columns in some tables and text in others.
fn code_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(u64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text.trim().to_string(),
        Code::Number(number) => number.to_string(),
    })
}

/// Legacy store backed by a JSON export file.
#[derive(Debug, Default)]
pub struct JsonExport {
    export: LegacyExport,
}

impl JsonExport {
    /// Reads and parses an export file.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::FileRead` if the file cannot be read and
    /// `MigrationError::ExportSchema` if it does not match the export layout.
    pub fn from_path(path: &Path) -> MigrationResult<Self> {
        let text = std::fs::read_to_string(path).map_err(MigrationError::FileRead)?;
        Self::from_json(&text)
    }

    /// Parses an export from JSON text.
    ///
    /// Schema errors name the failing path (e.g. `tonometry[2].od`).
    pub fn from_json(text: &str) -> MigrationResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let export = serde_path_to_error::deserialize::<_, LegacyExport>(&mut deserializer)
            .map_err(|err| {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                MigrationError::ExportSchema(format!("{path}: {source}"))
            })?;

        Ok(Self { export })
    }

    fn lookup(&self, category: DetailCategory, code: &str, date: NaiveDate) -> MigrationResult<VisitDetail> {
        let export = &self.export;
        let same_visit = |row_code: &str, row_date: NaiveDate| row_code == code && row_date == date;

        let detail = match category {
            DetailCategory::Tonometry => VisitDetail::Tonometry(
                export
                    .tonometry
                    .iter()
                    .filter(|row| same_visit(&row.code, row.date))
                    .map(|row| {
                        Ok(TonometryReading {
                            time: parse_reading_time(&row.time)?,
                            od: row.od,
                            oi: row.oi,
                        })
                    })
                    .collect::<MigrationResult<Vec<_>>>()?,
            ),
            DetailCategory::Records => VisitDetail::Records(
                export
                    .records
                    .iter()
                    .filter(|row| same_visit(&row.code, row.date))
                    .map(|row| VisitRecord {
                        title: fold_diacritics(&row.title),
                        content: fold_diacritics(&row.content),
                    })
                    .collect(),
            ),
            DetailCategory::Optometrics => VisitDetail::Optometrics(
                export
                    .optometrics
                    .iter()
                    .filter(|row| same_visit(&row.code, row.date))
                    .map(|row| Optometric {
                        date: Some(row.date.to_string()),
                        right_eye: row.right_eye.clone(),
                        left_eye: row.left_eye.clone(),
                        right_eye_sc: row.right_eye_sc.clone(),
                        left_eye_sc: row.left_eye_sc.clone(),
                    })
                    .collect(),
            ),
        };

        Ok(detail)
    }
}

/// Tonometry times are stored as `HH:MM` or `HH:MM:SS`; seconds are dropped.
fn parse_reading_time(value: &str) -> MigrationResult<NaiveTime> {
    let value = value.trim();
    let time = NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| MigrationError::DetailLookup(format!("invalid tonometry time {value:?}: {e}")))?;

    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
        .ok_or_else(|| MigrationError::DetailLookup(format!("invalid tonometry time {value:?}")))
}

impl PatientSource for JsonExport {
    fn patients(&self) -> MigrationResult<Vec<RawPatient>> {
        Ok(self.export.patients.clone())
    }

    fn clinic_rows(&self, code: &str) -> MigrationResult<Vec<String>> {
        Ok(self.export.clinic.get(code).cloned().unwrap_or_default())
    }
}

impl VisitDetailSource for JsonExport {
    fn fetch(
        &self,
        category: DetailCategory,
        code: &str,
        date: NaiveDate,
    ) -> impl Future<Output = MigrationResult<VisitDetail>> + Send {
        std::future::ready(self.lookup(category, code, date))
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Writes each patient to `<dir>/<code>.yaml`.
#[derive(Debug, Clone)]
pub struct YamlDirectorySink {
    dir: PathBuf,
}

impl YamlDirectorySink {
    /// Creates the output directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> MigrationResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(MigrationError::OutputDirCreation)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination of a patient's document.
    pub fn path_for(&self, code: &str) -> MigrationResult<PathBuf> {
        validate_code_safe_for_file_name(code)?;
        Ok(self.dir.join(format!("{code}.{PATIENT_FILE_EXTENSION}")))
    }
}

impl RecordSink for YamlDirectorySink {
    fn persist(&mut self, patient: &Patient) -> MigrationResult<()> {
        let path = self.path_for(&patient.code)?;
        let yaml = serde_yaml::to_string(patient).map_err(MigrationError::YamlSerialization)?;
        std::fs::write(&path, yaml).map_err(MigrationError::FileWrite)?;
        tracing::debug!(path = %path.display(), "wrote patient document");
        Ok(())
    }
}

/// Keeps migrated patients in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    patients: Vec<Patient>,
}

impl MemorySink {
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn into_patients(self) -> Vec<Patient> {
        self.patients
    }
}

impl RecordSink for MemorySink {
    fn persist(&mut self, patient: &Patient) -> MigrationResult<()> {
        self.patients.push(patient.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oftalmo_types::{NonEmptyText, Phone, PostalAddress, Visit};

    const EXPORT: &str = r#"{
        "patients": [{"COD_PAC": 7, "PACIENTE": "Ruiz, Ana", "NOMBRE": null}],
        "clinic": {"7": ["1-1-2001 Primera visita."]},
        "tonometry": [
            {"code": 7, "date": "2001-01-01", "time": "10:30:15", "od": 16, "oi": 15},
            {"code": "8", "date": "2001-01-01", "time": "11:00", "od": 20, "oi": 20}
        ],
        "records": [
            {"code": "7", "date": "2001-01-01", "title": "Informe", "content": "Visión correcta"}
        ],
        "optometrics": [
            {"code": 7, "date": "2001-01-01", "right_eye": "0.8", "left_eye": "0.9"}
        ]
    }"#;

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2001, 1, 1).expect("valid date")
    }

    fn sample_patient(code: &str) -> Patient {
        Patient {
            code: code.to_string(),
            name: NonEmptyText::new("Ana").expect("name"),
            surname: NonEmptyText::new("Ruiz").expect("surname"),
            date_birth: None,
            job: None,
            referred_by: None,
            national_id: None,
            company: None,
            postal_address: vec![PostalAddress::default()],
            phone: vec![Phone::personal(None)],
            visits: vec![Visit::new(jan_first(), "Primera visita.")],
        }
    }

    #[test]
    fn reads_patients_and_clinic_rows() {
        let export = JsonExport::from_json(EXPORT).expect("parse export");

        let patients = export.patients().expect("patients");
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].code(), Some("7"));
        assert_eq!(
            export.clinic_rows("7").expect("clinic"),
            vec!["1-1-2001 Primera visita.".to_string()]
        );
        assert!(export.clinic_rows("99").expect("clinic").is_empty());
    }

    #[test]
    fn looks_up_details_by_code_and_date() {
        let export = JsonExport::from_json(EXPORT).expect("parse export");

        match export
            .lookup(DetailCategory::Tonometry, "7", jan_first())
            .expect("tonometry")
        {
            VisitDetail::Tonometry(readings) => {
                assert_eq!(readings.len(), 1);
                assert_eq!(readings[0].time, NaiveTime::from_hms_opt(10, 30, 0).expect("time"));
            }
            other => panic!("expected tonometry, got {other:?}"),
        }

        match export
            .lookup(DetailCategory::Records, "7", jan_first())
            .expect("records")
        {
            VisitDetail::Records(records) => assert_eq!(records[0].content, "Vision correcta"),
            other => panic!("expected records, got {other:?}"),
        }

        match export
            .lookup(DetailCategory::Optometrics, "7", jan_first())
            .expect("optometrics")
        {
            VisitDetail::Optometrics(rows) => {
                assert_eq!(rows[0].date.as_deref(), Some("2001-01-01"));
                assert_eq!(rows[0].right_eye.as_deref(), Some("0.8"));
            }
            other => panic!("expected optometrics, got {other:?}"),
        }
    }

    #[test]
    fn schema_errors_name_the_failing_path() {
        let err = JsonExport::from_json(
            r#"{"tonometry": [{"code": 1, "date": "2001-01-01", "time": "10:00", "od": "high", "oi": 1}]}"#,
        )
        .expect_err("bad od");

        match err {
            MigrationError::ExportSchema(msg) => assert!(msg.contains("tonometry[0].od"), "{msg}"),
            other => panic!("expected ExportSchema, got {other:?}"),
        }
    }

    #[test]
    fn schema_rejects_unknown_tables() {
        let err = JsonExport::from_json(r#"{"visits": []}"#).expect_err("unknown key");
        assert!(matches!(err, MigrationError::ExportSchema(msg) if msg.contains("visits")));
    }

    #[test]
    fn invalid_reading_time_is_a_lookup_error() {
        let export = JsonExport::from_json(
            r#"{"tonometry": [{"code": 1, "date": "2001-01-01", "time": "late", "od": 1, "oi": 1}]}"#,
        )
        .expect("parse export");

        let err = export
            .lookup(DetailCategory::Tonometry, "1", jan_first())
            .expect_err("bad time");
        assert!(matches!(err, MigrationError::DetailLookup(msg) if msg.contains("late")));
    }

    #[test]
    fn yaml_sink_writes_one_document_per_patient() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = YamlDirectorySink::create(dir.path().join("out")).expect("create sink");

        sink.persist(&sample_patient("7")).expect("persist");

        let written =
            std::fs::read_to_string(dir.path().join("out").join("7.yaml")).expect("read back");
        let back: Patient = serde_yaml::from_str(&written).expect("parse yaml");
        assert_eq!(back, sample_patient("7"));
        assert!(written.contains("surname: Ruiz"));
    }

    #[test]
    fn yaml_sink_rejects_unsafe_codes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = YamlDirectorySink::create(dir.path()).expect("create sink");

        let err = sink
            .persist(&sample_patient("../escape"))
            .expect_err("unsafe code");
        assert!(matches!(err, MigrationError::InvalidInput(_)));
    }
}
