//! Pre-flight readiness gate.
//!
//! Checks configuration completeness and the certificate bundle before any
//! network call. Failures are collected into a [`PrecheckReport`]; nothing
//! here returns an error.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info};

use crate::cert::verify_certificate;
use crate::config::{missing_keys, ConfigKey, ConfigSource};

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    Failed { message: String },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Aggregated precheck result.
#[derive(Debug, Clone, Serialize)]
pub struct PrecheckReport {
    /// Required keys that are absent or empty.
    pub missing_keys: Vec<ConfigKey>,

    /// Configuration completeness.
    pub config: CheckOutcome,

    /// Certificate bundle validity.
    pub certificate: CheckOutcome,

    /// Path that was checked, if configured.
    pub certificate_path: Option<PathBuf>,
}

impl PrecheckReport {
    /// True only when every check passed.
    pub fn passed(&self) -> bool {
        self.config.passed() && self.certificate.passed()
    }

    /// Human-readable list of failed checks.
    pub fn violations(&self) -> Vec<String> {
        [&self.config, &self.certificate]
            .into_iter()
            .filter_map(|outcome| match outcome {
                CheckOutcome::Passed => None,
                CheckOutcome::Failed { message } => Some(message.clone()),
            })
            .collect()
    }
}

/// Config validator: every required key must be present and non-empty.
pub fn check_config(source: &dyn ConfigSource) -> (Vec<ConfigKey>, CheckOutcome) {
    let missing = missing_keys(source);
    if missing.is_empty() {
        info!("All required environment variables are set.");
        return (missing, CheckOutcome::Passed);
    }

    let names: Vec<&str> = missing.iter().map(|k| k.env_name()).collect();
    let message = format!(
        "The following environment variables are not set: {}",
        names.join(", ")
    );
    error!(missing = ?names, "{}", message);
    (missing, CheckOutcome::Failed { message })
}

/// Certificate verifier: the configured PEM file must start with a private key.
pub fn check_certificate(source: &dyn ConfigSource) -> (Option<PathBuf>, CheckOutcome) {
    let path = source
        .get_non_empty(ConfigKey::ClientCertPath.env_name())
        .map(PathBuf::from);

    match verify_certificate(path.as_deref()) {
        Ok(()) => {
            info!("PEM file contains a valid private key.");
            (path, CheckOutcome::Passed)
        }
        Err(e) => {
            error!(error = %e, "certificate check failed");
            (
                path,
                CheckOutcome::Failed {
                    message: e.to_string(),
                },
            )
        }
    }
}

/// Run both checks and build the report.
pub fn precheck_report(source: &dyn ConfigSource) -> PrecheckReport {
    let (missing_keys, config) = check_config(source);
    let (certificate_path, certificate) = check_certificate(source);

    let report = PrecheckReport {
        missing_keys,
        config,
        certificate,
        certificate_path,
    };

    if report.passed() {
        info!("Setup verification successful.");
    } else {
        error!("Setup verification failed. Please check the errors above.");
    }

    report
}

/// Readiness signal: true only if configuration and certificate both pass.
pub fn run_precheck(source: &dyn ConfigSource) -> bool {
    precheck_report(source).passed()
}
