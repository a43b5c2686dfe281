//! Per-visit detail enrichment.
//!
//! The legacy store keeps instrument rows, written records and optometric measurements in
//! tables keyed by patient code and visit date. [`VisitDetailEnricher`] looks them up for every
//! visit of a patient concurrently and merges what comes back into the visits.
//!
//! Lookups are spawned on a [`JoinSet`] before any of them is awaited. A lookup that fails,
//! times out or panics leaves its visit without data for that category and is reported in the
//! [`EnrichmentReport`]; it never aborts the other visits.

use crate::error::{MigrationError, MigrationResult};
use chrono::NaiveDate;
use oftalmo_types::{Optometric, Patient, TonometryReading, Visit, VisitRecord};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// A detail table of the legacy store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetailCategory {
    Tonometry,
    Records,
    Optometrics,
}

impl DetailCategory {
    /// Every category, in processing order.
    pub const ALL: [DetailCategory; 3] = [
        DetailCategory::Tonometry,
        DetailCategory::Records,
        DetailCategory::Optometrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetailCategory::Tonometry => "tonometry",
            DetailCategory::Records => "records",
            DetailCategory::Optometrics => "optometrics",
        }
    }
}

impl fmt::Display for DetailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailCategory {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tonometry" => Ok(DetailCategory::Tonometry),
            "records" => Ok(DetailCategory::Records),
            "optometrics" => Ok(DetailCategory::Optometrics),
            other => Err(MigrationError::InvalidInput(format!(
                "unknown detail category {other:?} (expected tonometry, records or optometrics)"
            ))),
        }
    }
}

/// Rows returned by one lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum VisitDetail {
    Tonometry(Vec<TonometryReading>),
    Records(Vec<VisitRecord>),
    Optometrics(Vec<Optometric>),
}

/// Asynchronous lookup of one visit's rows in one detail table.
pub trait VisitDetailSource: Send + Sync + 'static {
    fn fetch(
        &self,
        category: DetailCategory,
        code: &str,
        date: NaiveDate,
    ) -> impl Future<Output = MigrationResult<VisitDetail>> + Send;
}

/// A lookup that did not produce data for its visit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailFailure {
    pub code: String,
    /// `None` when the lookup task panicked and its visit could not be identified.
    pub date: Option<NaiveDate>,
    pub category: DetailCategory,
    pub message: String,
}

#[derive(Debug)]
pub struct EnrichmentReport {
    pub patient: Patient,
    pub failures: Vec<DetailFailure>,
}

/// Fans detail lookups out over a patient's visits.
#[derive(Debug)]
pub struct VisitDetailEnricher<S> {
    source: Arc<S>,
    timeout: Option<Duration>,
}

impl<S> Clone for VisitDetailEnricher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            timeout: self.timeout,
        }
    }
}

impl<S: VisitDetailSource> VisitDetailEnricher<S> {
    /// `timeout` bounds each lookup separately; `None` waits indefinitely.
    pub fn new(source: Arc<S>, timeout: Option<Duration>) -> Self {
        Self { source, timeout }
    }

    /// Looks up `category` for every visit of `patient` and merges the results.
    pub async fn enrich(&self, mut patient: Patient, category: DetailCategory) -> EnrichmentReport {
        if patient.visits.is_empty() {
            return EnrichmentReport {
                patient,
                failures: Vec::new(),
            };
        }

        let mut tasks = JoinSet::new();
        for (index, visit) in patient.visits.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let code = patient.code.clone();
            let date = visit.date;
            let timeout = self.timeout;

            tasks.spawn(async move {
                let lookup = source.fetch(category, &code, date);
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, lookup)
                        .await
                        .unwrap_or(Err(MigrationError::DetailTimeout)),
                    None => lookup.await,
                };
                (index, outcome)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((index, Ok(detail))) => {
                    if let Some(visit) = patient.visits.get_mut(index) {
                        merge(visit, detail);
                    }
                    continue;
                }
                Ok((index, Err(err))) => DetailFailure {
                    code: patient.code.clone(),
                    date: patient.visits.get(index).map(|v| v.date),
                    category,
                    message: err.to_string(),
                },
                Err(join_err) => DetailFailure {
                    code: patient.code.clone(),
                    date: None,
                    category,
                    message: join_err.to_string(),
                },
            };

            tracing::warn!(
                code = %failure.code,
                date = ?failure.date,
                category = %category,
                error = %failure.message,
                "visit detail lookup failed"
            );
            failures.push(failure);
        }

        EnrichmentReport { patient, failures }
    }

    /// Runs [`enrich`](Self::enrich) for each category in turn.
    pub async fn enrich_all(&self, patient: Patient, categories: &[DetailCategory]) -> EnrichmentReport {
        let mut report = EnrichmentReport {
            patient,
            failures: Vec::new(),
        };
        for &category in categories {
            let next = self.enrich(report.patient, category).await;
            report.patient = next.patient;
            report.failures.extend(next.failures);
        }
        report
    }
}

/// Tonometry rows are appended after the readings found in the notes, skipping exact
/// duplicates. Records and optometrics replace the visit's lists.
fn merge(visit: &mut Visit, detail: VisitDetail) {
    match detail {
        VisitDetail::Tonometry(readings) => {
            for reading in readings {
                if !visit.tonometry.contains(&reading) {
                    visit.tonometry.push(reading);
                }
            }
        }
        VisitDetail::Records(records) => visit.records = records,
        VisitDetail::Optometrics(optometrics) => visit.optometrics = optometrics,
    }
}
