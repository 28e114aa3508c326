//! Persisted patient document and translation helpers.
//!
//! The record store keeps one JSON document per patient with the flat legacy shape:
//! `isTransferRequested`/`isTransferred`/`transferredAt` flags rather than a phase. This
//! module is the only place those flags exist.
//!
//! Responsibilities:
//! - Define the document (wire) model for serialisation/deserialisation
//! - Translate between the document and [`Patient`]
//! - Reject documents that break the transfer invariants
//!
//! Legacy documents written by older clients sometimes carry both `isTransferRequested`
//! and `isTransferred`. The finalized flag wins and the request flag is dropped on the
//! next save.

use crate::model::{
    Patient, PatientId, Pendency, Situation, Status, Transfer, TransferPhase,
};
use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire representation of a patient for on-disk JSON.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub medical_record: String,
    #[serde(default)]
    pub age: Option<u16>,
    #[serde(default)]
    pub corridor: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub mobility: String,
    #[serde(default)]
    pub diet: Vec<String>,
    #[serde(default)]
    pub disabilities: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub venous_access: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub situation: Situation,
    #[serde(default)]
    pub pendencies: Pendency,
    #[serde(default)]
    pub has_bracelet: bool,
    #[serde(default)]
    pub has_bed_identification: bool,
    #[serde(default = "default_true")]
    pub has_prescription: bool,
    #[serde(default)]
    pub is_transfer_requested: bool,
    #[serde(default)]
    pub is_transferred: bool,
    #[serde(default)]
    pub transferred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transfer_destination_sector: Option<String>,
    #[serde(default)]
    pub transfer_destination_bed: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PatientDocument {
    /// Parse a patient document from JSON text.
    ///
    /// Uses `serde_path_to_error` so a schema mismatch names the failing field.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::InvalidRecord`] if the JSON does not match the document
    /// schema or the document breaks a transfer invariant.
    pub fn parse(json: &str) -> CorridorResult<Patient> {
        let mut deserializer = serde_json::Deserializer::from_str(json);

        let document = match serde_path_to_error::deserialize::<_, PatientDocument>(
            &mut deserializer,
        ) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(CorridorError::InvalidRecord(format!(
                    "patient document schema mismatch at {path}: {source}"
                )));
            }
        };

        document.into_patient()
    }

    /// Render a patient as pretty-printed JSON.
    pub fn render(patient: &Patient) -> CorridorResult<String> {
        serde_json::to_string_pretty(&Self::from_patient(patient))
            .map_err(CorridorError::Serialization)
    }

    pub fn from_patient(patient: &Patient) -> Self {
        let (is_transfer_requested, is_transferred, transferred_at) = match patient.phase() {
            TransferPhase::Active => (false, false, None),
            TransferPhase::Requested => (true, false, None),
            TransferPhase::Finalized { at } => (false, true, Some(at)),
        };

        Self {
            id: patient.id.to_string(),
            name: patient.name.clone(),
            medical_record: patient.medical_record.clone(),
            age: patient.age,
            corridor: patient.corridor.clone(),
            specialty: patient.specialty.clone(),
            diagnosis: patient.diagnosis.clone(),
            mobility: patient.mobility.clone(),
            diet: patient.diet.clone(),
            disabilities: patient.disabilities.clone(),
            notes: patient.notes.clone(),
            venous_access: patient.venous_access.clone(),
            status: patient.status,
            situation: patient.situation,
            pendencies: patient.pendency,
            has_bracelet: patient.has_bracelet,
            has_bed_identification: patient.has_bed_identification,
            has_prescription: patient.has_prescription,
            is_transfer_requested,
            is_transferred,
            transferred_at,
            transfer_destination_sector: patient.transfer.destination_sector.clone(),
            transfer_destination_bed: patient.transfer.destination_bed.clone(),
            created_at: patient.created_at,
            created_by: patient.created_by.clone(),
        }
    }

    /// Convert the document into the domain model.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::InvalidRecord`] if the id is blank or the document is
    /// marked transferred without a `transferredAt` timestamp.
    pub fn into_patient(self) -> CorridorResult<Patient> {
        if self.id.trim().is_empty() {
            return Err(CorridorError::InvalidRecord(
                "patient document has an empty id".into(),
            ));
        }

        let phase = match (self.is_transferred, self.transferred_at) {
            (true, Some(at)) => TransferPhase::Finalized { at },
            (true, None) => {
                return Err(CorridorError::InvalidRecord(format!(
                    "patient {} is transferred but has no transferredAt",
                    self.id
                )));
            }
            (false, _) if self.is_transfer_requested => TransferPhase::Requested,
            (false, _) => TransferPhase::Active,
        };

        Ok(Patient {
            id: PatientId::new(self.id),
            name: self.name,
            medical_record: self.medical_record,
            age: self.age,
            corridor: self.corridor,
            specialty: self.specialty,
            diagnosis: self.diagnosis,
            mobility: self.mobility,
            diet: self.diet,
            disabilities: self.disabilities,
            notes: self.notes,
            venous_access: self.venous_access,
            status: self.status,
            situation: self.situation,
            pendency: self.pendencies,
            has_bracelet: self.has_bracelet,
            has_bed_identification: self.has_bed_identification,
            has_prescription: self.has_prescription,
            transfer: Transfer {
                phase,
                destination_sector: self.transfer_destination_sector,
                destination_bed: self.transfer_destination_bed,
            },
            created_at: self.created_at,
            created_by: self.created_by,
        })
    }
}
