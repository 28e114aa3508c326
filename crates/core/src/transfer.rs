//! Transfer and discharge orchestration.
//!
//! ```text
//!            request                finalize
//!   Active ----------> Requested ------------> Finalized { at }
//!     ^                    |
//!     +------ cancel ------+
//!
//!   Active --(finalize, auto-eligible status)--> Finalized { at }
//! ```
//!
//! `TransferToSecondaryFacility` and `TransferExternal` are auto-eligible: they cannot be
//! requested and are finalized straight from `Active`. External transfers also need the
//! receiving facility, supplied at finalize time.
//!
//! Every transition checks the current phase first. Repeating a transition is an
//! [`Outcome::Unchanged`] no-op and a finalized record never has its `transferredAt`
//! rewritten.

use crate::model::{Outcome, Patient, Status, TransferPhase};
use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use corridor_types::NonEmptyText;

/// Destination captured when a transfer is requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    sector: NonEmptyText,
    bed: NonEmptyText,
}

impl TransferRequest {
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if the sector or bed is blank.
    pub fn new(sector: &str, bed: &str) -> CorridorResult<Self> {
        let sector = NonEmptyText::uppercase(sector)
            .map_err(|_| CorridorError::Validation("destination sector is required".into()))?;
        let bed = NonEmptyText::new(bed)
            .map_err(|_| CorridorError::Validation("destination bed is required".into()))?;
        Ok(Self { sector, bed })
    }

    pub fn sector(&self) -> &str {
        self.sector.as_str()
    }

    pub fn bed(&self) -> &str {
        self.bed.as_str()
    }
}

/// `Active -> Requested`.
///
/// The patient stays `Admitted` while the transfer is pending.
///
/// # Errors
///
/// - [`CorridorError::GuardViolation`] if the record is finalized, or its status is
///   auto-eligible and skips the request step.
pub fn request_transfer(patient: &mut Patient, request: &TransferRequest) -> CorridorResult<Outcome> {
    match patient.phase() {
        TransferPhase::Finalized { .. } => Err(CorridorError::GuardViolation(format!(
            "cannot request transfer: patient {} is already finalized",
            patient.id
        ))),
        TransferPhase::Requested => {
            tracing::debug!("transfer for {} already requested", patient.id);
            Ok(Outcome::Unchanged)
        }
        TransferPhase::Active if patient.status.is_auto_transfer() => {
            Err(CorridorError::GuardViolation(format!(
                "cannot request transfer: patient {} has status {}, finalize it directly",
                patient.id, patient.status
            )))
        }
        TransferPhase::Active => {
            patient.transfer.phase = TransferPhase::Requested;
            patient.transfer.destination_sector = Some(request.sector().to_string());
            patient.transfer.destination_bed = Some(request.bed().to_string());
            patient.status = Status::Admitted;
            Ok(Outcome::Applied)
        }
    }
}

/// Internal sub-flow: seals a requested transfer, or an auto-eligible one to a secondary
/// facility. Destination fields were filled at request time and are not touched.
///
/// # Errors
///
/// - [`CorridorError::Validation`] for `TransferExternal`, which needs a destination.
/// - [`CorridorError::GuardViolation`] if no transfer was requested.
pub fn finalize_internal_transfer(
    patient: &mut Patient,
    now: DateTime<Utc>,
) -> CorridorResult<Outcome> {
    if patient.is_finalized() {
        tracing::debug!("transfer of {} already finalized", patient.id);
        return Ok(Outcome::Unchanged);
    }
    if patient.status == Status::TransferExternal {
        return Err(CorridorError::Validation(format!(
            "patient {} is an external transfer and needs a destination",
            patient.id
        )));
    }
    if patient.phase() == TransferPhase::Active && !patient.status.is_auto_transfer() {
        return Err(CorridorError::GuardViolation(format!(
            "cannot finalize transfer: no transfer requested for patient {}",
            patient.id
        )));
    }

    patient.transfer.phase = TransferPhase::Finalized { at: now };
    Ok(Outcome::Applied)
}

/// External sub-flow: seals a `TransferExternal` record, recording the receiving
/// facility (uppercased) as the destination bed.
///
/// # Errors
///
/// - [`CorridorError::Validation`] if `destination` is blank.
/// - [`CorridorError::GuardViolation`] if the status is not `TransferExternal`.
pub fn finalize_external_transfer(
    patient: &mut Patient,
    destination: &str,
    now: DateTime<Utc>,
) -> CorridorResult<Outcome> {
    if patient.is_finalized() {
        tracing::debug!("transfer of {} already finalized", patient.id);
        return Ok(Outcome::Unchanged);
    }
    let destination = NonEmptyText::uppercase(destination)
        .map_err(|_| CorridorError::Validation("external destination is required".into()))?;
    if patient.status != Status::TransferExternal {
        return Err(CorridorError::GuardViolation(format!(
            "cannot finalize external transfer: patient {} has status {}",
            patient.id, patient.status
        )));
    }

    patient.transfer.destination_bed = Some(destination.into_inner());
    patient.transfer.phase = TransferPhase::Finalized { at: now };
    Ok(Outcome::Applied)
}

/// Routes to the internal or external sub-flow by status.
pub fn finalize_transfer(
    patient: &mut Patient,
    destination: Option<&str>,
    now: DateTime<Utc>,
) -> CorridorResult<Outcome> {
    if patient.status == Status::TransferExternal {
        finalize_external_transfer(patient, destination.unwrap_or_default(), now)
    } else {
        finalize_internal_transfer(patient, now)
    }
}

/// `Requested -> Active`. Destination fields are kept.
pub fn cancel_transfer(patient: &mut Patient) -> CorridorResult<Outcome> {
    match patient.phase() {
        TransferPhase::Requested => {
            patient.transfer.phase = TransferPhase::Active;
            Ok(Outcome::Applied)
        }
        TransferPhase::Active => Ok(Outcome::Unchanged),
        TransferPhase::Finalized { .. } => Err(CorridorError::GuardViolation(format!(
            "cannot cancel transfer: patient {} is already finalized",
            patient.id
        ))),
    }
}
