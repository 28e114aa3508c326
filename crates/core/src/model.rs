//! Corridor patient model.
//!
//! [`Patient`] is the only entity the core owns. The transfer lifecycle is held as an
//! explicit [`TransferPhase`] rather than the `isTransferRequested`/`isTransferred`
//! flag pair; the flags only exist in the persisted document (see [`crate::record`]).

use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, immutable patient identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PatientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lowercases and strips separators so `transfer-external`, `TRANSFER_EXTERNAL` and
/// `transferExternal` all name the same variant.
fn normalise_variant(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! closed_enum {
    ($name:ident, $what:literal, [$($variant:ident),+ $(,)?]) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CorridorError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalise_variant(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| normalise_variant(v.as_str()) == wanted)
                    .ok_or_else(|| CorridorError::Validation(format!("unknown {}: {s}", $what)))
            }
        }
    };
}

/// Clinical/administrative status of a corridor patient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    Admitted,
    Observation,
    Reassessment,
    Discharged,
    TransferToSecondaryFacility,
    TransferExternal,
}

closed_enum!(
    Status,
    "status",
    [
        Admitted,
        Observation,
        Reassessment,
        Discharged,
        TransferToSecondaryFacility,
        TransferExternal,
    ]
);

impl Status {
    /// Statuses that may be finalized without an explicit transfer request.
    pub fn is_auto_transfer(&self) -> bool {
        matches!(
            self,
            Status::TransferToSecondaryFacility | Status::TransferExternal
        )
    }
}

/// Physical accommodation in the corridor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Situation {
    #[default]
    Stretcher,
    Chair,
}

closed_enum!(Situation, "situation", [Stretcher, Chair]);

/// The single outstanding blocker recorded against a patient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pendency {
    #[default]
    None,
    AwaitingLabExam,
    #[serde(rename = "awaitingCTScan")]
    AwaitingCTScan,
    AwaitingXRay,
    AwaitingUltrasound,
    ExamsDoneAwaitingResult,
    NoMedicalPrescription,
    NoDiet,
    AwaitingSocialWorker,
}

closed_enum!(
    Pendency,
    "pendency",
    [
        None,
        AwaitingLabExam,
        AwaitingCTScan,
        AwaitingXRay,
        AwaitingUltrasound,
        ExamsDoneAwaitingResult,
        NoMedicalPrescription,
        NoDiet,
        AwaitingSocialWorker,
    ]
);

impl Pendency {
    pub fn is_exam(&self) -> bool {
        matches!(
            self,
            Pendency::AwaitingLabExam
                | Pendency::AwaitingCTScan
                | Pendency::AwaitingXRay
                | Pendency::AwaitingUltrasound
                | Pendency::ExamsDoneAwaitingResult
        )
    }

    pub fn is_prescription(&self) -> bool {
        matches!(self, Pendency::NoMedicalPrescription | Pendency::NoDiet)
    }
}

/// Where a patient is in the transfer/discharge lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum TransferPhase {
    /// In the corridor, no transfer requested.
    Active,
    /// Transfer requested, waiting to be finalized.
    Requested,
    /// Transfer or discharge sealed. Terminal.
    Finalized { at: DateTime<Utc> },
}

/// Transfer lifecycle plus the destination captured along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub phase: TransferPhase,
    pub destination_sector: Option<String>,
    pub destination_bed: Option<String>,
}

impl Default for Transfer {
    fn default() -> Self {
        Self {
            phase: TransferPhase::Active,
            destination_sector: None,
            destination_bed: None,
        }
    }
}

/// Result of applying an action to a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// The record changed and must be saved.
    Applied,
    /// The record was already in the target state.
    Unchanged,
    /// No record with that id exists; treated as success.
    NotFound,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub medical_record: String,
    pub age: Option<u16>,
    pub corridor: String,
    pub specialty: String,
    pub diagnosis: String,
    pub mobility: String,
    pub diet: Vec<String>,
    pub disabilities: Vec<String>,
    pub notes: String,
    pub venous_access: String,
    pub status: Status,
    pub situation: Situation,
    pub pendency: Pendency,
    pub has_bracelet: bool,
    pub has_bed_identification: bool,
    pub has_prescription: bool,
    pub transfer: Transfer,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl Patient {
    /// Admits a new patient with the workflow defaults: admitted, no pendency, no
    /// safety identification yet.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if the name is blank.
    pub fn admit(input: NewPatient, now: DateTime<Utc>) -> CorridorResult<Self> {
        let name = corridor_types::NonEmptyText::new(&input.name)
            .map_err(|_| CorridorError::Validation("patient name is required".into()))?;

        Ok(Self {
            id: PatientId::generate(),
            name: name.into_inner(),
            medical_record: input.medical_record.trim().to_string(),
            age: input.age,
            corridor: input.corridor,
            specialty: input.specialty,
            diagnosis: input.diagnosis,
            mobility: input.mobility,
            diet: input.diet,
            disabilities: input.disabilities,
            notes: input.notes,
            venous_access: input.venous_access,
            status: Status::Admitted,
            situation: input.situation,
            pendency: Pendency::None,
            has_bracelet: false,
            has_bed_identification: false,
            has_prescription: true,
            transfer: Transfer::default(),
            created_at: now,
            created_by: input.created_by,
        })
    }

    pub fn phase(&self) -> TransferPhase {
        self.transfer.phase
    }

    /// Still held in the corridor (not finalized).
    pub fn is_active(&self) -> bool {
        !self.is_finalized()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.transfer.phase, TransferPhase::Finalized { .. })
    }

    pub fn is_transfer_requested(&self) -> bool {
        self.transfer.phase == TransferPhase::Requested
    }

    pub fn transferred_at(&self) -> Option<DateTime<Utc>> {
        match self.transfer.phase {
            TransferPhase::Finalized { at } => Some(at),
            _ => None,
        }
    }

    /// Missing bracelet or bed identification.
    pub fn has_safety_gap(&self) -> bool {
        !self.has_bracelet || !self.has_bed_identification
    }

    /// Any open blocker, including a safety gap.
    pub fn has_open_pendency(&self) -> bool {
        self.pendency != Pendency::None || self.has_safety_gap()
    }

    /// Admitted within `ttl` of `now`. Replaces the old stored "new record" flag.
    pub fn is_recent(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.is_active() && now >= self.created_at && now - self.created_at <= ttl
    }

    pub(crate) fn ensure_not_finalized(&self, action: &str) -> CorridorResult<()> {
        if self.is_finalized() {
            return Err(CorridorError::GuardViolation(format!(
                "cannot {action}: patient {} is already finalized",
                self.id
            )));
        }
        Ok(())
    }
}

/// Input for admitting a patient to the corridor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPatient {
    pub name: String,
    pub medical_record: String,
    pub age: Option<u16>,
    pub corridor: String,
    pub specialty: String,
    pub diagnosis: String,
    pub mobility: String,
    pub situation: Situation,
    pub venous_access: String,
    pub notes: String,
    pub diet: Vec<String>,
    pub disabilities: Vec<String>,
    pub created_by: Option<String>,
}

/// A direct edit. Only the fields that are `Some` are written.
///
/// Transfer state is deliberately absent: it only moves through [`crate::transfer`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientEdit {
    pub name: Option<String>,
    pub medical_record: Option<String>,
    pub age: Option<u16>,
    pub corridor: Option<String>,
    pub specialty: Option<String>,
    pub diagnosis: Option<String>,
    pub mobility: Option<String>,
    pub diet: Option<Vec<String>>,
    pub disabilities: Option<Vec<String>>,
    pub notes: Option<String>,
    pub venous_access: Option<String>,
    pub status: Option<Status>,
    pub situation: Option<Situation>,
    pub pendency: Option<Pendency>,
    pub has_bracelet: Option<bool>,
    pub has_bed_identification: Option<bool>,
    pub has_prescription: Option<bool>,
}

impl PatientEdit {
    /// Applies the edit to an active record.
    ///
    /// # Errors
    ///
    /// - [`CorridorError::GuardViolation`] if the record is finalized.
    /// - [`CorridorError::Validation`] if the edit blanks the name.
    pub fn apply(self, patient: &mut Patient) -> CorridorResult<Outcome> {
        patient.ensure_not_finalized("edit")?;

        let before = patient.clone();

        if let Some(name) = self.name {
            let name = corridor_types::NonEmptyText::new(name)
                .map_err(|_| CorridorError::Validation("patient name is required".into()))?;
            patient.name = name.into_inner();
        }
        if let Some(medical_record) = self.medical_record {
            patient.medical_record = medical_record.trim().to_string();
        }
        if let Some(age) = self.age {
            patient.age = Some(age);
        }
        if let Some(corridor) = self.corridor {
            patient.corridor = corridor;
        }
        if let Some(specialty) = self.specialty {
            patient.specialty = specialty;
        }
        if let Some(diagnosis) = self.diagnosis {
            patient.diagnosis = diagnosis;
        }
        if let Some(mobility) = self.mobility {
            patient.mobility = mobility;
        }
        if let Some(diet) = self.diet {
            patient.diet = diet;
        }
        if let Some(disabilities) = self.disabilities {
            patient.disabilities = disabilities;
        }
        if let Some(notes) = self.notes {
            patient.notes = notes;
        }
        if let Some(venous_access) = self.venous_access {
            patient.venous_access = venous_access;
        }
        if let Some(status) = self.status {
            patient.status = status;
        }
        if let Some(situation) = self.situation {
            patient.situation = situation;
        }
        if let Some(pendency) = self.pendency {
            patient.pendency = pendency;
            // A missing-prescription pendency withdraws the prescription unless the same
            // edit says otherwise.
            if pendency == Pendency::NoMedicalPrescription && self.has_prescription.is_none() {
                patient.has_prescription = false;
            }
        }
        if let Some(flag) = self.has_bracelet {
            patient.has_bracelet = flag;
        }
        if let Some(flag) = self.has_bed_identification {
            patient.has_bed_identification = flag;
        }
        if let Some(flag) = self.has_prescription {
            patient.has_prescription = flag;
        }

        if *patient == before {
            Ok(Outcome::Unchanged)
        } else {
            Ok(Outcome::Applied)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn admit_applies_workflow_defaults() {
        let p = Patient::admit(
            NewPatient {
                name: "  Maria Souza ".into(),
                ..Default::default()
            },
            at(2024, 3, 1, 12, 0),
        )
        .unwrap();

        assert_eq!(p.name, "Maria Souza");
        assert_eq!(p.status, Status::Admitted);
        assert_eq!(p.pendency, Pendency::None);
        assert!(!p.has_bracelet);
        assert!(!p.has_bed_identification);
        assert_eq!(p.phase(), TransferPhase::Active);
        assert_eq!(p.id.as_str().len(), 32);
    }

    #[test]
    fn admit_requires_name() {
        let err = Patient::admit(NewPatient::default(), at(2024, 3, 1, 12, 0)).unwrap_err();
        assert!(matches!(err, CorridorError::Validation(_)));
    }

    #[test]
    fn enums_parse_loosely() {
        assert_eq!(
            "transfer-external".parse::<Status>().unwrap(),
            Status::TransferExternal
        );
        assert_eq!(
            "AWAITING_CT_SCAN".parse::<Pendency>().unwrap(),
            Pendency::AwaitingCTScan
        );
        assert_eq!("chair".parse::<Situation>().unwrap(), Situation::Chair);
        assert!("sofa".parse::<Situation>().is_err());
    }

    #[test]
    fn edit_reports_unchanged_when_nothing_differs() {
        let mut p = patient("a", "Ana");
        let edit = PatientEdit {
            specialty: Some("General Surgery".into()),
            ..Default::default()
        };
        assert_eq!(edit.apply(&mut p).unwrap(), Outcome::Unchanged);

        let edit = PatientEdit {
            pendency: Some(Pendency::AwaitingXRay),
            ..Default::default()
        };
        assert_eq!(edit.apply(&mut p).unwrap(), Outcome::Applied);
        assert_eq!(p.pendency, Pendency::AwaitingXRay);
    }

    #[test]
    fn missing_prescription_pendency_clears_prescription_flag() {
        let mut p = patient("a", "Ana");
        p.has_prescription = true;
        let edit = PatientEdit {
            pendency: Some(Pendency::NoMedicalPrescription),
            ..Default::default()
        };
        assert_eq!(edit.apply(&mut p).unwrap(), Outcome::Applied);
        assert_eq!(p.pendency, Pendency::NoMedicalPrescription);
        assert!(!p.has_prescription);

        let mut q = patient("b", "Bruno");
        q.has_prescription = true;
        let edit = PatientEdit {
            pendency: Some(Pendency::NoMedicalPrescription),
            has_prescription: Some(true),
            ..Default::default()
        };
        edit.apply(&mut q).unwrap();
        assert!(q.has_prescription);

        let mut r = patient("c", "Carla");
        r.has_prescription = true;
        let edit = PatientEdit {
            pendency: Some(Pendency::AwaitingXRay),
            ..Default::default()
        };
        edit.apply(&mut r).unwrap();
        assert!(r.has_prescription);
    }

    #[test]
    fn edit_rejected_on_finalized_record() {
        let mut p = patient("a", "Ana");
        p.transfer.phase = TransferPhase::Finalized {
            at: at(2024, 1, 11, 9, 0),
        };
        let err = PatientEdit {
            notes: Some("late note".into()),
            ..Default::default()
        }
        .apply(&mut p)
        .unwrap_err();
        assert!(matches!(err, CorridorError::GuardViolation(_)));
        assert!(p.notes.is_empty());
    }

    #[test]
    fn edit_with_blank_name_leaves_record_untouched() {
        let mut p = patient("a", "Ana");
        let err = PatientEdit {
            name: Some("  ".into()),
            ..Default::default()
        }
        .apply(&mut p)
        .unwrap_err();
        assert!(matches!(err, CorridorError::Validation(_)));
        assert_eq!(p.name, "Ana");
    }

    #[test]
    fn recent_flag_expires_after_ttl() {
        let p = patient("a", "Ana");
        let ttl = chrono::Duration::seconds(90);
        assert!(p.is_recent(at(2024, 1, 10, 8, 1), ttl));
        assert!(!p.is_recent(at(2024, 1, 10, 8, 2), ttl));
    }
}
