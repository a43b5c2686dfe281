//! Patient row normalisation.
//!
//! Turns one row of the legacy patient table into a [`Patient`] without visits: the company is
//! checked against a [`CompanyPolicy`], the `"SURNAME, NAME"` field is split and every text
//! value is folded to plain Latin letters.

use crate::constants::{
    EXPECTED_COMPANIES, FIELD_ADDRESS, FIELD_CITY, FIELD_CODE, FIELD_COMPANY, FIELD_COUNTRY,
    FIELD_DATE_BIRTH, FIELD_JOB, FIELD_NAME, FIELD_NATIONAL_ID, FIELD_PHONE, FIELD_POSTAL_CODE,
    FIELD_REFERRED_BY, FIELD_STATE,
};
use crate::error::{PipelineError, PipelineResult};
use crate::text::fold_diacritics;
use crate::validation::validate_code_safe_for_file_name;
use oftalmo_types::{NonEmptyText, Patient, Phone, PostalAddress};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A legacy patient row: column name to value, `None` for SQL `NULL`.
///
/// Deserialises from a map whose values are strings, numbers, booleans or null. Numbers are
/// kept in their textual form since codes and phone numbers were stored as numeric columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct RawPatient {
    fields: BTreeMap<String, Option<String>>,
}

impl RawPatient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.fields.insert(key.into(), value);
    }

    /// Value of a column, `None` when the column is missing or `NULL`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_deref())
    }

    /// Legacy patient code, if present.
    pub fn code(&self) -> Option<&str> {
        self.get(FIELD_CODE).map(str::trim).filter(|c| !c.is_empty())
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for RawPatient {
    type Error = String;

    fn try_from(map: BTreeMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let fields = map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(format!("column {key} must be a scalar value"))
                    }
                };
                Ok((key, value))
            })
            .collect::<Result<BTreeMap<_, _>, String>>()?;

        Ok(Self { fields })
    }
}

/// Decides whether a patient's company/category is acceptable.
pub trait CompanyPolicy: std::fmt::Debug + Send + Sync {
    fn accepts(&self, company: &str) -> bool;
}

/// Accepts every company. This is the policy the clinic currently runs with.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl CompanyPolicy for AcceptAll {
    fn accepts(&self, _company: &str) -> bool {
        true
    }
}

/// Accepts a blank company or one of a fixed set, compared case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowList {
    companies: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            companies: companies
                .into_iter()
                .map(|c| c.as_ref().trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// The companies found when the legacy data was first audited.
    pub fn expected_companies() -> Self {
        Self::new(EXPECTED_COMPANIES)
    }

    pub fn companies(&self) -> &[String] {
        &self.companies
    }
}

impl CompanyPolicy for AllowList {
    fn accepts(&self, company: &str) -> bool {
        let company = company.trim().to_uppercase();
        company.is_empty() || self.companies.contains(&company)
    }
}

/// Validates and canonicalises legacy patient rows.
#[derive(Debug)]
pub struct PatientNormalizer {
    company_policy: Box<dyn CompanyPolicy>,
}

impl Default for PatientNormalizer {
    fn default() -> Self {
        Self::new(AcceptAll)
    }
}

impl PatientNormalizer {
    pub fn new(company_policy: impl CompanyPolicy + 'static) -> Self {
        Self::with_boxed_policy(Box::new(company_policy))
    }

    pub fn with_boxed_policy(company_policy: Box<dyn CompanyPolicy>) -> Self {
        Self { company_policy }
    }

    /// Builds a patient, without visits, from a legacy row.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` if:
    /// - the company is rejected by the policy,
    /// - the patient code is missing, blank or not usable as a file name,
    /// - the name field is missing, has no comma, or either half is blank.
    pub fn normalize(&self, raw: &RawPatient) -> PipelineResult<Patient> {
        let company = raw.get(FIELD_COMPANY).unwrap_or_default();
        if !self.company_policy.accepts(company) {
            return Err(PipelineError::validation(company, "unknown company"));
        }

        let full_name = raw.get(FIELD_NAME).unwrap_or_default();
        let code = raw
            .code()
            .ok_or_else(|| PipelineError::validation(full_name, "missing patient code"))?;
        validate_code_safe_for_file_name(code).map_err(|_| {
            PipelineError::validation(code, "patient code is not usable as a file name")
        })?;

        let (surname, given) = full_name
            .split_once(',')
            .ok_or_else(|| PipelineError::validation(full_name, "expected \"SURNAME, NAME\""))?;
        let surname = NonEmptyText::new(fold_diacritics(surname))
            .map_err(|_| PipelineError::validation(full_name, "surname is empty"))?;
        let name = NonEmptyText::new(fold_diacritics(given))
            .map_err(|_| PipelineError::validation(full_name, "given name is empty"))?;

        let text = |key: &str| raw.get(key).map(fold_diacritics);

        Ok(Patient {
            code: fold_diacritics(code),
            name,
            surname,
            date_birth: text(FIELD_DATE_BIRTH),
            job: text(FIELD_JOB),
            referred_by: text(FIELD_REFERRED_BY),
            national_id: text(FIELD_NATIONAL_ID),
            company: text(FIELD_COMPANY),
            postal_address: vec![PostalAddress {
                address: text(FIELD_ADDRESS),
                city: text(FIELD_CITY),
                state: text(FIELD_STATE),
                postal_code: text(FIELD_POSTAL_CODE),
                country: text(FIELD_COUNTRY),
            }],
            phone: vec![Phone::personal(text(FIELD_PHONE))],
            visits: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> RawPatient {
        RawPatient::new()
            .with(FIELD_CODE, "1204")
            .with(FIELD_NAME, name)
            .with(FIELD_COMPANY, "ASISA")
    }

    fn reason(err: PipelineError) -> (String, String) {
        match err {
            PipelineError::Validation { input, reason } => (input, reason),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn splits_surname_and_given_name() {
        let patient = PatientNormalizer::default()
            .normalize(&row("Garcia Lopez, Maria"))
            .expect("normalize");

        assert_eq!(patient.surname.as_str(), "Garcia Lopez");
        assert_eq!(patient.name.as_str(), "Maria");
        assert_eq!(patient.code, "1204");
        assert!(patient.visits.is_empty());
    }

    #[test]
    fn splits_on_first_comma_only() {
        let patient = PatientNormalizer::default()
            .normalize(&row("Ruiz, Ana, Sofia"))
            .expect("normalize");

        assert_eq!(patient.surname.as_str(), "Ruiz");
        assert_eq!(patient.name.as_str(), "Ana, Sofia");
    }

    #[test]
    fn folds_every_text_field() {
        let raw = row("Peña Ibáñez, José")
            .with(FIELD_CITY, "A Coruña")
            .with(FIELD_JOB, "Diseñador gráfico");
        let patient = PatientNormalizer::default().normalize(&raw).expect("normalize");

        assert_eq!(patient.surname.as_str(), "Pena Ibanez");
        assert_eq!(patient.name.as_str(), "Jose");
        assert_eq!(patient.postal_address[0].city.as_deref(), Some("A Coruna"));
        assert_eq!(patient.job.as_deref(), Some("Disenador grafico"));
    }

    #[test]
    fn builds_single_address_and_personal_phone() {
        let raw = row("Diaz, Luis")
            .with(FIELD_ADDRESS, "C/ Mayor 3")
            .with(FIELD_POSTAL_CODE, "28013")
            .with(FIELD_PHONE, "915551234");
        let patient = PatientNormalizer::default().normalize(&raw).expect("normalize");

        assert_eq!(patient.postal_address.len(), 1);
        assert_eq!(patient.postal_address[0].address.as_deref(), Some("C/ Mayor 3"));
        assert_eq!(patient.postal_address[0].country, None);
        assert_eq!(patient.phone, vec![Phone::personal(Some("915551234".into()))]);
    }

    #[test]
    fn rejects_name_without_comma() {
        let err = PatientNormalizer::default()
            .normalize(&row("Maria Garcia"))
            .expect_err("should reject");
        let (input, reason) = reason(err);
        assert_eq!(input, "Maria Garcia");
        assert!(reason.contains("SURNAME, NAME"));
    }

    #[test]
    fn rejects_blank_name_halves() {
        let (_, reason_text) = reason(
            PatientNormalizer::default()
                .normalize(&row("Garcia,  "))
                .expect_err("blank given name"),
        );
        assert_eq!(reason_text, "given name is empty");

        let (_, reason_text) = reason(
            PatientNormalizer::default()
                .normalize(&row(" , Maria"))
                .expect_err("blank surname"),
        );
        assert_eq!(reason_text, "surname is empty");
    }

    #[test]
    fn rejects_missing_code() {
        let raw = RawPatient::new().with(FIELD_NAME, "Garcia, Maria");
        let (_, reason_text) = reason(
            PatientNormalizer::default()
                .normalize(&raw)
                .expect_err("missing code"),
        );
        assert_eq!(reason_text, "missing patient code");
    }

    #[test]
    fn rejects_code_unusable_as_file_name() {
        let raw = row("Garcia, Maria").with(FIELD_CODE, "12 B/3");
        let (input, reason_text) = reason(
            PatientNormalizer::default()
                .normalize(&raw)
                .expect_err("unsafe code"),
        );
        assert_eq!(input, "12 B/3");
        assert_eq!(reason_text, "patient code is not usable as a file name");
    }

    #[test]
    fn accept_all_takes_any_company() {
        let raw = row("Garcia, Maria").with(FIELD_COMPANY, "MUTUA DESCONOCIDA");
        assert!(PatientNormalizer::default().normalize(&raw).is_ok());
    }

    #[test]
    fn allow_list_rejects_unknown_company() {
        let normalizer = PatientNormalizer::new(AllowList::expected_companies());
        let raw = row("Garcia, Maria").with(FIELD_COMPANY, "MUTUA DESCONOCIDA");

        let (input, reason_text) = reason(normalizer.normalize(&raw).expect_err("rejected"));
        assert_eq!(input, "MUTUA DESCONOCIDA");
        assert_eq!(reason_text, "unknown company");
    }

    #[test]
    fn allow_list_accepts_listed_or_blank_company() {
        let normalizer = PatientNormalizer::new(AllowList::new(["Adeslas"]));

        assert!(normalizer
            .normalize(&row("Garcia, Maria").with(FIELD_COMPANY, "adeslas"))
            .is_ok());
        assert!(normalizer
            .normalize(&row("Garcia, Maria").with(FIELD_COMPANY, ""))
            .is_ok());

        let mut raw = row("Garcia, Maria");
        raw.insert(FIELD_COMPANY, None);
        assert!(normalizer.normalize(&raw).is_ok());
    }

    #[test]
    fn raw_patient_deserialises_scalars() {
        let raw: RawPatient = serde_json::from_str(
            r#"{"COD_PAC": 1204, "PACIENTE": "Garcia, Maria", "DNI": null, "GAF": false}"#,
        )
        .expect("deserialise");

        assert_eq!(raw.code(), Some("1204"));
        assert_eq!(raw.get("DNI"), None);
        assert_eq!(raw.get("GAF"), Some("false"));
    }

    #[test]
    fn raw_patient_rejects_nested_values() {
        let err = serde_json::from_str::<RawPatient>(r#"{"PACIENTE": {"a": 1}}"#)
            .expect_err("nested value");
        assert!(err.to_string().contains("PACIENTE"));
    }
}
