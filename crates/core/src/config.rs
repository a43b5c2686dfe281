//! Migration runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the migration. The parsing helpers take `Option<String>` values rather than
//! reading environment variables themselves, so tests and multi-threaded callers never depend
//! on process-wide state.

use crate::enrich::DetailCategory;
use crate::error::{MigrationError, MigrationResult};
use crate::patient::{AcceptAll, AllowList, CompanyPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the migration does with a patient the pipeline rejects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the patient as skipped and carry on.
    #[default]
    Skip,
    /// Stop and return the pipeline error.
    Halt,
}

/// Migration configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct MigrationConfig {
    input_path: PathBuf,
    output_dir: PathBuf,
    company_allow_list: Option<AllowList>,
    detail_timeout: Option<Duration>,
    detail_categories: Vec<DetailCategory>,
    failure_policy: FailurePolicy,
}

impl MigrationConfig {
    /// Create a new `MigrationConfig`.
    pub fn new(
        input_path: PathBuf,
        output_dir: PathBuf,
        company_allow_list: Option<AllowList>,
        detail_timeout: Option<Duration>,
        detail_categories: Vec<DetailCategory>,
        failure_policy: FailurePolicy,
    ) -> MigrationResult<Self> {
        if input_path.as_os_str().is_empty() {
            return Err(MigrationError::InvalidInput(
                "input path cannot be empty".into(),
            ));
        }
        if output_dir.as_os_str().is_empty() {
            return Err(MigrationError::InvalidInput(
                "output directory cannot be empty".into(),
            ));
        }
        if detail_timeout.is_some_and(|t| t.is_zero()) {
            return Err(MigrationError::InvalidInput(
                "detail timeout must be positive".into(),
            ));
        }

        Ok(Self {
            input_path,
            output_dir,
            company_allow_list,
            detail_timeout,
            detail_categories,
            failure_policy,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Policy for the patient normaliser: the allow list when configured, otherwise accept all.
    pub fn company_policy(&self) -> Box<dyn CompanyPolicy> {
        match &self.company_allow_list {
            Some(list) => Box::new(list.clone()),
            None => Box::new(AcceptAll),
        }
    }

    pub fn detail_timeout(&self) -> Option<Duration> {
        self.detail_timeout
    }

    pub fn detail_categories(&self) -> &[DetailCategory] {
        &self.detail_categories
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve a path from an optional value, falling back to `default`.
pub fn path_from_env_value(value: Option<String>, default: &str) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| default.to_string()))
}

/// Parse a comma-separated company allow list.
///
/// If `value` is `None` or empty/whitespace, returns `None` (every company is accepted).
pub fn company_allow_list_from_env_value(value: Option<String>) -> Option<AllowList> {
    non_blank(value).map(|v| AllowList::new(v.split(',')))
}

/// Parse the per-lookup timeout in whole seconds.
///
/// If `value` is `None` or empty/whitespace, returns `None` (no timeout).
pub fn detail_timeout_from_env_value(value: Option<String>) -> MigrationResult<Option<Duration>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };

    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(MigrationError::InvalidInput(format!(
            "detail timeout must be a positive number of seconds, got {value:?}"
        ))),
    }
}

/// Parse a comma-separated list of detail categories.
///
/// If `value` is `None` or empty/whitespace, returns every category. Duplicates are dropped
/// and the result is always in processing order.
pub fn detail_categories_from_env_value(
    value: Option<String>,
) -> MigrationResult<Vec<DetailCategory>> {
    let Some(value) = non_blank(value) else {
        return Ok(DetailCategory::ALL.to_vec());
    };

    let requested = value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<DetailCategory>)
        .collect::<MigrationResult<Vec<_>>>()?;

    Ok(DetailCategory::ALL
        .into_iter()
        .filter(|c| requested.contains(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_falls_back_to_default() {
        assert_eq!(
            path_from_env_value(None, "legacy.json"),
            PathBuf::from("legacy.json")
        );
        assert_eq!(
            path_from_env_value(Some("  ".into()), "legacy.json"),
            PathBuf::from("legacy.json")
        );
        assert_eq!(
            path_from_env_value(Some(" /data/in.json ".into()), "legacy.json"),
            PathBuf::from("/data/in.json")
        );
    }

    #[test]
    fn allow_list_is_optional() {
        assert!(company_allow_list_from_env_value(None).is_none());
        assert!(company_allow_list_from_env_value(Some(" ".into())).is_none());

        let list = company_allow_list_from_env_value(Some("once, asisa,,".into()))
            .expect("allow list");
        assert_eq!(list.companies(), ["ONCE".to_string(), "ASISA".to_string()]);
    }

    #[test]
    fn timeout_must_be_positive_seconds() {
        assert_eq!(detail_timeout_from_env_value(None).expect("unset"), None);
        assert_eq!(
            detail_timeout_from_env_value(Some("15".into())).expect("valid"),
            Some(Duration::from_secs(15))
        );

        for bad in ["0", "-3", "soon"] {
            let err = detail_timeout_from_env_value(Some(bad.into())).expect_err("invalid");
            assert!(matches!(err, MigrationError::InvalidInput(_)), "{bad}");
        }
    }

    #[test]
    fn categories_default_to_all_in_order() {
        assert_eq!(
            detail_categories_from_env_value(None).expect("unset"),
            DetailCategory::ALL.to_vec()
        );
        assert_eq!(
            detail_categories_from_env_value(Some("optometrics,tonometry,tonometry".into()))
                .expect("subset"),
            vec![DetailCategory::Tonometry, DetailCategory::Optometrics]
        );

        let err = detail_categories_from_env_value(Some("records,lenses".into()))
            .expect_err("unknown category");
        assert!(matches!(err, MigrationError::InvalidInput(msg) if msg.contains("lenses")));
    }

    #[test]
    fn config_rejects_zero_timeout() {
        let err = MigrationConfig::new(
            PathBuf::from("in.json"),
            PathBuf::from("out"),
            None,
            Some(Duration::ZERO),
            DetailCategory::ALL.to_vec(),
            FailurePolicy::Skip,
        )
        .expect_err("zero timeout");
        assert!(matches!(err, MigrationError::InvalidInput(_)));
    }

    #[test]
    fn company_policy_follows_allow_list() {
        let open = MigrationConfig::new(
            PathBuf::from("in.json"),
            PathBuf::from("out"),
            None,
            None,
            Vec::new(),
            FailurePolicy::default(),
        )
        .expect("config");
        assert!(open.company_policy().accepts("ANY"));

        let restricted = MigrationConfig::new(
            PathBuf::from("in.json"),
            PathBuf::from("out"),
            Some(AllowList::expected_companies()),
            None,
            Vec::new(),
            FailurePolicy::Halt,
        )
        .expect("config");
        assert!(restricted.company_policy().accepts("asisa"));
        assert!(!restricted.company_policy().accepts("OTRA"));
        assert_eq!(restricted.failure_policy(), FailurePolicy::Halt);
    }
}
