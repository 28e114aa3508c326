//! # Corridor Core
//!
//! Core business logic for tracking patients held in hospital overflow corridors, from
//! admission to transfer or discharge.
//!
//! This crate contains the workflow rules and the record store:
//! - the patient model and its transfer/discharge state machine ([`model`], [`transfer`])
//! - pendency classification and resolution ([`pendency`])
//! - venous access staleness ([`venous_access`])
//! - bulk discharge/delete and selection ([`bulk`])
//! - list/search projections and corridor statistics ([`projection`])
//! - the advisory collaborator seam ([`advisory`])
//! - sharded JSON storage of patient documents ([`store`], [`record`])
//!
//! [`CorridorService`] ties these together.
//!
//! **No API concerns**: HTTP servers and command-line front ends belong in
//! `corridor-api-rest` and `corridor-cli`.

pub mod advisory;
pub mod bulk;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod pendency;
pub mod projection;
pub mod record;
pub mod service;
pub mod store;
pub mod transfer;
pub mod venous_access;

pub use advisory::{
    AdvisoryOutcome, AdvisoryService, EligibilityFilter, NarrativeRequest, Prioritized,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigValues, CoreConfig};
pub use error::{CorridorError, CorridorResult};
pub use model::{
    NewPatient, Outcome, Patient, PatientEdit, PatientId, Pendency, Situation, Status,
    TransferPhase,
};
pub use projection::{ListQuery, View};
pub use service::CorridorService;
pub use store::{JsonFileStore, MemoryStore, PatientStore};
