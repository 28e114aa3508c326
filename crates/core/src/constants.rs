//! Constants used throughout the corridor core crate.

/// Default directory for patient data storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Directory name for patient documents under the data directory.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// File extension for stored patient documents.
pub const DOCUMENT_EXTENSION: &str = "json";

/// Hours after which a peripheral venous access is due for replacement.
pub const DEFAULT_VENOUS_ACCESS_HOURS: u32 = 96;

/// How long a freshly admitted record is highlighted as new.
pub const DEFAULT_NEW_RECORD_TTL_SECS: u64 = 90;

/// Deadline for a single advisory call.
pub const DEFAULT_ADVISORY_TIMEOUT_SECS: u64 = 30;

/// Diet recorded when a diet pendency is resolved without explicit tags.
pub const DEFAULT_DIET: &str = "Free";
