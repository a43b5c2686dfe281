//! Migration driver.
//!
//! Walks every patient of a [`PatientSource`], runs the [`Pipeline`] over its clinic rows,
//! enriches the visits from a [`VisitDetailSource`] and hands the result to a [`RecordSink`].

use crate::config::{FailurePolicy, MigrationConfig};
use crate::enrich::{DetailFailure, VisitDetailEnricher, VisitDetailSource};
use crate::error::{MigrationResult, PipelineError};
use crate::patient::PatientNormalizer;
use crate::pipeline::Pipeline;
use crate::source::{PatientSource, RecordSink};
use std::sync::Arc;

/// A patient the pipeline rejected under [`FailurePolicy::Skip`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedPatient {
    pub code: Option<String>,
    pub error: PipelineError,
}

/// Outcome of a migration run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub migrated: usize,
    pub skipped: Vec<SkippedPatient>,
    pub detail_failures: Vec<DetailFailure>,
}

/// Service that moves patients from the legacy store to the new record format.
#[derive(Clone, Debug)]
pub struct MigrationService {
    cfg: Arc<MigrationConfig>,
}

impl MigrationService {
    /// Creates a new `MigrationService`.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Company policy, detail categories, lookup timeout and failure policy.
    pub fn new(cfg: Arc<MigrationConfig>) -> Self {
        Self { cfg }
    }

    /// Migrates every patient of `source`.
    ///
    /// Patients are processed one at a time in source order; the visits of one patient are
    /// enriched concurrently.
    ///
    /// # Arguments
    ///
    /// * `source` - Legacy patient rows and clinic notes.
    /// * `details` - Per-visit detail tables.
    /// * `sink` - Destination of migrated patients.
    ///
    /// # Errors
    ///
    /// Returns an error if the source or the sink fails, or if a patient is rejected by the
    /// pipeline while the failure policy is [`FailurePolicy::Halt`].
    pub async fn run<P, D, K>(
        &self,
        source: &P,
        details: Arc<D>,
        sink: &mut K,
    ) -> MigrationResult<MigrationSummary>
    where
        P: PatientSource,
        D: VisitDetailSource,
        K: RecordSink,
    {
        let pipeline = Pipeline::new(PatientNormalizer::with_boxed_policy(
            self.cfg.company_policy(),
        ));
        let enricher = VisitDetailEnricher::new(details, self.cfg.detail_timeout());

        let rows = source.patients()?;
        tracing::info!(patients = rows.len(), "starting migration");

        let mut summary = MigrationSummary::default();
        for raw in &rows {
            let code = raw.code().map(str::to_owned);
            let clinic_rows = match &code {
                Some(code) => source.clinic_rows(code)?,
                None => Vec::new(),
            };

            let patient = match pipeline.run(raw, clinic_rows.as_slice()) {
                Ok(patient) => patient,
                Err(error) => match self.cfg.failure_policy() {
                    FailurePolicy::Halt => return Err(error.into()),
                    FailurePolicy::Skip => {
                        tracing::warn!(
                            code = code.as_deref().unwrap_or("<missing>"),
                            error = %error,
                            "skipping patient"
                        );
                        summary.skipped.push(SkippedPatient { code, error });
                        continue;
                    }
                },
            };

            let report = enricher
                .enrich_all(patient, self.cfg.detail_categories())
                .await;
            summary.detail_failures.extend(report.failures);

            sink.persist(&report.patient)?;
            summary.migrated += 1;
            tracing::info!(
                code = %report.patient.code,
                visits = report.patient.visits.len(),
                "migrated patient"
            );
        }

        tracing::info!(
            migrated = summary.migrated,
            skipped = summary.skipped.len(),
            detail_failures = summary.detail_failures.len(),
            "migration finished"
        );
        Ok(summary)
    }
}
