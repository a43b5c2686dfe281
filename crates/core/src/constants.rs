//! Constants used throughout the Oftalmo core crate.
//!
//! Column names of the legacy patient table, calendar tables for the date parser and the
//! environment variable names read by the binary at start-up.

/// Legacy patient code.
pub const FIELD_CODE: &str = "COD_PAC";
/// Legacy name field, formatted as `"SURNAME, NAME"`.
pub const FIELD_NAME: &str = "PACIENTE";
pub const FIELD_ADDRESS: &str = "DIRECCION";
pub const FIELD_CITY: &str = "POBLACION";
pub const FIELD_STATE: &str = "PROVINCIA";
pub const FIELD_POSTAL_CODE: &str = "CODPOS";
pub const FIELD_COUNTRY: &str = "PAIS";
pub const FIELD_PHONE: &str = "TELEFONO";
pub const FIELD_DATE_BIRTH: &str = "FECHAN";
pub const FIELD_JOB: &str = "PROFESION";
pub const FIELD_REFERRED_BY: &str = "PRESENTADO";
pub const FIELD_NATIONAL_ID: &str = "DNI";
/// Insurance company or patient category.
pub const FIELD_COMPANY: &str = "NOMBRE";

/// Spanish month names, January first.
pub const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Abbreviations seen in the notes, with their month number.
pub const MONTH_ABBREVIATIONS: [(&str, u32); 14] = [
    ("ene", 1),
    ("feb", 2),
    ("mar", 3),
    ("abr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("sep", 9),
    ("sept", 9),
    ("set", 9),
    ("oct", 10),
    ("nov", 11),
    ("dic", 12),
];

/// Companies the clinic expected when the data was first audited.
pub const EXPECTED_COMPANIES: [&str; 6] = ["ONCE", "ADESLAS", "ASISA", "PRIVADO", "CASER", "ABOGADOS"];

pub const ENV_INPUT: &str = "OFTALMO_INPUT";
pub const ENV_OUTPUT_DIR: &str = "OFTALMO_OUTPUT_DIR";
pub const ENV_COMPANY_ALLOW_LIST: &str = "OFTALMO_COMPANY_ALLOW_LIST";
pub const ENV_DETAIL_TIMEOUT_SECS: &str = "OFTALMO_DETAIL_TIMEOUT_SECS";
pub const ENV_DETAIL_CATEGORIES: &str = "OFTALMO_DETAIL_CATEGORIES";

/// Export file read when neither a flag nor the environment names one.
pub const DEFAULT_INPUT_FILE: &str = "legacy_export.json";

/// Output directory used when neither a flag nor the environment names one.
pub const DEFAULT_OUTPUT_DIR: &str = "migrated_patients";

/// Extension of the per-patient documents written by the YAML sink.
pub const PATIENT_FILE_EXTENSION: &str = "yaml";
