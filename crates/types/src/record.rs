//! Migrated patient record.
//!
//! The shape mirrors the document written to the target store: one `Patient` per legacy
//! patient row, owning an ordered list of `Visit`s recovered from the free-text clinic notes.

use crate::NonEmptyText;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Phone type recorded for the single legacy phone number.
pub const PERSONAL_PHONE_TYPE: &str = "personal";

/// A migrated patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Legacy patient code (`COD_PAC`).
    pub code: String,
    /// Given name, taken from the part after the comma of the legacy name field.
    pub name: NonEmptyText,
    /// Surname, taken from the part before the comma of the legacy name field.
    pub surname: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    /// National identity document number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    /// Insurance company or patient category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub postal_address: Vec<PostalAddress>,
    pub phone: Vec<Phone>,
    /// Visits in the order their dates appear in the clinic notes. Never absent.
    #[serde(default)]
    pub visits: Vec<Visit>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    #[serde(rename = "type")]
    pub phone_type: String,
    pub number: Option<String>,
}

impl Phone {
    /// The patient's own number, as stored by the legacy system.
    pub fn personal(number: Option<String>) -> Self {
        Self {
            phone_type: PERSONAL_PHONE_TYPE.to_string(),
            number,
        }
    }
}

/// One clinical encounter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub date: NaiveDate,
    /// Clinic notes left over once instrument blocks have been extracted.
    pub clinic: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tonometry: Vec<TonometryReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donder: Option<RefractionBlock>,
    /// Clinic letters filed against the visit date.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<VisitRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optometrics: Vec<Optometric>,
}

impl Visit {
    /// Creates a visit with notes only; measurements and details are attached afterwards.
    pub fn new(date: NaiveDate, clinic: impl Into<String>) -> Self {
        Self {
            date,
            clinic: clinic.into(),
            tonometry: Vec::new(),
            donder: None,
            records: Vec::new(),
            optometrics: Vec::new(),
        }
    }
}

/// Intra-ocular pressure reading from a tonometer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonometryReading {
    #[serde(with = "hour_minute")]
    pub time: NaiveTime,
    /// Right eye pressure (mmHg).
    pub od: u16,
    /// Left eye pressure (mmHg).
    pub oi: u16,
}

/// Refraction ("donders") block for both eyes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefractionBlock {
    pub od: EyeRefraction,
    pub oi: EyeRefraction,
}

/// Refraction values for a single eye, in instrument column order.
///
/// Blank instrument cells are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeRefraction {
    pub uncorrected_acuity: Option<f64>,
    pub sphere: Option<f64>,
    pub cylinder: Option<f64>,
    pub axis: Option<f64>,
    pub corrected_acuity: Option<f64>,
    pub corrected_sphere: Option<f64>,
    pub final_acuity: Option<f64>,
}

/// Clinic letter filed for a visit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub title: String,
    pub content: String,
}

/// Visual acuity row from the legacy optometry table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Optometric {
    pub date: Option<String>,
    pub right_eye: Option<String>,
    pub left_eye: Option<String>,
    /// Right eye without correction.
    pub right_eye_sc: Option<String>,
    /// Left eye without correction.
    pub left_eye_sc: Option<String>,
}

/// Serialises a `NaiveTime` as `HH:MM`, the resolution the tonometer prints.
mod hour_minute {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
