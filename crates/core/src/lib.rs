//! # Oftalmo Core
//!
//! Core logic for migrating the ophthalmology clinic's legacy patient store.
//!
//! This crate contains two layers:
//! - The text-to-record pipeline: text canonicalisation, date parsing, visit segmentation,
//!   instrument block extraction and patient normalisation. It is synchronous and pure.
//! - The migration around it: source and sink contracts, per-visit detail enrichment and the
//!   driver that ties them together.
//!
//! **No CLI concerns**: argument parsing, `.env` loading and logging setup belong in `oftalmo-cli`.

pub mod config;
pub mod constants;
pub mod date;
pub mod enrich;
pub mod error;
pub mod measurement;
pub mod migrate;
pub mod patient;
pub mod pipeline;
pub mod segment;
pub mod source;
pub mod text;
pub mod validation;

pub use config::{FailurePolicy, MigrationConfig};
pub use date::parse_date;
pub use enrich::{
    DetailCategory, DetailFailure, EnrichmentReport, VisitDetail, VisitDetailEnricher,
    VisitDetailSource,
};
pub use error::{MigrationError, MigrationResult, PipelineError, PipelineResult};
pub use measurement::{Extracted, MeasurementExtractor, RefractionExtractor, TonometryExtractor};
pub use migrate::{MigrationService, MigrationSummary, SkippedPatient};
pub use patient::{AcceptAll, AllowList, CompanyPolicy, PatientNormalizer, RawPatient};
pub use pipeline::Pipeline;
pub use segment::{segment, VisitSpan};
pub use source::{JsonExport, MemorySink, PatientSource, RecordSink, YamlDirectorySink};
