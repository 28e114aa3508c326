//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services
//! as an `Arc<CoreConfig>`. Binaries read the environment (after loading `.env`) and hand
//! the raw strings to [`CoreConfig::from_values`], so nothing in the core reads
//! process-wide environment variables while handling a request.

use crate::constants::{
    DEFAULT_ADVISORY_TIMEOUT_SECS, DEFAULT_NEW_RECORD_TTL_SECS, DEFAULT_PATIENT_DATA_DIR,
    DEFAULT_VENOUS_ACCESS_HOURS, PATIENTS_DIR_NAME,
};
use crate::{CorridorError, CorridorResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for any configured duration, to keep chrono arithmetic well inside range.
const MAX_CONFIG_SECS: u64 = 366 * 24 * 60 * 60;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    venous_access_hours: u32,
    new_record_ttl: Duration,
    advisory_timeout: Duration,
}

/// Raw, optional configuration values as read from the environment.
///
/// Missing or blank values fall back to the defaults in [`crate::constants`].
#[derive(Clone, Debug, Default)]
pub struct ConfigValues {
    pub patient_data_dir: Option<String>,
    pub venous_access_hours: Option<String>,
    pub new_record_ttl_secs: Option<String>,
    pub advisory_timeout_secs: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if the data directory is empty or any
    /// duration is zero or longer than a year.
    pub fn new(
        patient_data_dir: PathBuf,
        venous_access_hours: u32,
        new_record_ttl: Duration,
        advisory_timeout: Duration,
    ) -> CorridorResult<Self> {
        if patient_data_dir.as_os_str().is_empty() {
            return Err(CorridorError::Validation(
                "patient_data_dir cannot be empty".into(),
            ));
        }

        if venous_access_hours == 0 || u64::from(venous_access_hours) * 3600 > MAX_CONFIG_SECS {
            return Err(CorridorError::Validation(
                "venous access limit must be between 1 hour and one year".into(),
            ));
        }

        for (name, value) in [
            ("new_record_ttl", new_record_ttl),
            ("advisory_timeout", advisory_timeout),
        ] {
            if value.is_zero() || value.as_secs() > MAX_CONFIG_SECS {
                return Err(CorridorError::Validation(format!(
                    "{name} must be non-zero and at most one year"
                )));
            }
        }

        Ok(Self {
            patient_data_dir,
            venous_access_hours,
            new_record_ttl,
            advisory_timeout,
        })
    }

    /// Configuration with every tunable at its default, rooted at `patient_data_dir`.
    pub fn with_defaults(patient_data_dir: impl Into<PathBuf>) -> CorridorResult<Self> {
        Self::new(
            patient_data_dir.into(),
            DEFAULT_VENOUS_ACCESS_HOURS,
            Duration::from_secs(DEFAULT_NEW_RECORD_TTL_SECS),
            Duration::from_secs(DEFAULT_ADVISORY_TIMEOUT_SECS),
        )
    }

    /// Build a configuration from raw string values.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if a value is present but is not a positive
    /// integer, or if the resulting configuration fails [`CoreConfig::new`].
    pub fn from_values(values: ConfigValues) -> CorridorResult<Self> {
        let patient_data_dir = non_blank(values.patient_data_dir)
            .unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.to_string());

        let venous_access_hours = parse_positive(
            "CORRIDOR_VENOUS_ACCESS_HOURS",
            values.venous_access_hours,
            u64::from(DEFAULT_VENOUS_ACCESS_HOURS),
        )?;
        let venous_access_hours = u32::try_from(venous_access_hours).map_err(|_| {
            CorridorError::Validation("CORRIDOR_VENOUS_ACCESS_HOURS is out of range".into())
        })?;

        let ttl = parse_positive(
            "CORRIDOR_NEW_RECORD_TTL_SECS",
            values.new_record_ttl_secs,
            DEFAULT_NEW_RECORD_TTL_SECS,
        )?;
        let advisory = parse_positive(
            "CORRIDOR_ADVISORY_TIMEOUT_SECS",
            values.advisory_timeout_secs,
            DEFAULT_ADVISORY_TIMEOUT_SECS,
        )?;

        Self::new(
            PathBuf::from(patient_data_dir),
            venous_access_hours,
            Duration::from_secs(ttl),
            Duration::from_secs(advisory),
        )
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.patient_data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn venous_access_limit(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.venous_access_hours))
    }

    pub fn new_record_ttl(&self) -> chrono::Duration {
        // Bounded by MAX_CONFIG_SECS in `new`.
        chrono::Duration::seconds(self.new_record_ttl.as_secs() as i64)
    }

    pub fn advisory_timeout(&self) -> Duration {
        self.advisory_timeout
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive(name: &str, value: Option<String>, default: u64) -> CorridorResult<u64> {
    match non_blank(value) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(CorridorError::Validation(format!(
                "{name} must be a positive integer, got {raw:?}"
            ))),
        },
    }
}
