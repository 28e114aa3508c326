//! Request and response bodies for the REST API.
//!
//! Enum-valued fields travel as strings and are parsed with the core's lenient `FromStr`
//! impls, so `transferExternal`, `TRANSFER_EXTERNAL` and `transfer-external` are all
//! accepted. Timestamps are RFC 3339.

use corridor_core::advisory::Prioritized;
use corridor_core::bulk::{BulkDeleteReport, BulkDischargeReport};
use corridor_core::pendency::{self, PendencyBoard};
use corridor_core::projection::{CorridorStats, ListQuery};
use corridor_core::{
    CorridorResult, NewPatient, Patient, PatientEdit, PatientId, Situation, TransferPhase, View,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientDto {
    pub id: String,
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
    pub status: String,
    pub situation: String,
    pub pendency: String,
    pub has_bracelet: bool,
    pub has_bed_identification: bool,
    pub has_prescription: bool,
    /// `active`, `requested` or `finalized`.
    pub phase: String,
    pub is_transfer_requested: bool,
    pub is_transferred: bool,
    pub transferred_at: Option<String>,
    pub transfer_destination_sector: Option<String>,
    pub transfer_destination_bed: Option<String>,
    pub created_at: String,
    pub created_by: Option<String>,
}

impl From<&Patient> for PatientDto {
    fn from(p: &Patient) -> Self {
        let phase = match p.phase() {
            TransferPhase::Active => "active",
            TransferPhase::Requested => "requested",
            TransferPhase::Finalized { .. } => "finalized",
        };
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            medical_record: p.medical_record.clone(),
            age: p.age,
            corridor: p.corridor.clone(),
            specialty: p.specialty.clone(),
            diagnosis: p.diagnosis.clone(),
            mobility: p.mobility.clone(),
            diet: p.diet.clone(),
            disabilities: p.disabilities.clone(),
            notes: p.notes.clone(),
            venous_access: p.venous_access.clone(),
            status: p.status.to_string(),
            situation: p.situation.to_string(),
            pendency: p.pendency.to_string(),
            has_bracelet: p.has_bracelet,
            has_bed_identification: p.has_bed_identification,
            has_prescription: p.has_prescription,
            phase: phase.into(),
            is_transfer_requested: p.is_transfer_requested(),
            is_transferred: p.is_finalized(),
            transferred_at: p.transferred_at().map(|at| at.to_rfc3339()),
            transfer_destination_sector: p.transfer.destination_sector.clone(),
            transfer_destination_bed: p.transfer.destination_bed.clone(),
            created_at: p.created_at.to_rfc3339(),
            created_by: p.created_by.clone(),
        }
    }
}

pub fn patient_list(patients: &[Patient]) -> ListPatientsRes {
    ListPatientsRes {
        patients: patients.iter().map(PatientDto::from).collect(),
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientDto>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// `active` (default), `history`, `transferQueue` or `transferEligible`.
    pub view: Option<String>,
    /// Name or medical record fragment.
    pub search: Option<String>,
    pub specialty: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> CorridorResult<ListQuery> {
        let view: View = match self.view.as_deref().map(str::trim) {
            None | Some("") => Default::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(ListQuery {
            view,
            search: self.search.unwrap_or_default(),
            specialty: self.specialty,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePatientReq {
    pub name: String,
    pub medical_record: String,
    pub age: Option<u16>,
    pub corridor: String,
    pub specialty: String,
    pub diagnosis: String,
    pub mobility: String,
    /// `stretcher` (default) or `chair`.
    pub situation: Option<String>,
    pub venous_access: String,
    pub notes: String,
    pub diet: Vec<String>,
    pub disabilities: Vec<String>,
    pub created_by: Option<String>,
}

impl CreatePatientReq {
    pub fn into_new_patient(self) -> CorridorResult<NewPatient> {
        let situation: Situation = match self.situation.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => Default::default(),
        };
        Ok(NewPatient {
            name: self.name,
            medical_record: self.medical_record,
            age: self.age,
            corridor: self.corridor,
            specialty: self.specialty,
            diagnosis: self.diagnosis,
            mobility: self.mobility,
            situation,
            venous_access: self.venous_access,
            notes: self.notes,
            diet: self.diet,
            disabilities: self.disabilities,
            created_by: self.created_by,
        })
    }
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePatientReq {
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
    pub status: Option<String>,
    pub situation: Option<String>,
    pub pendency: Option<String>,
    pub has_bracelet: Option<bool>,
    pub has_bed_identification: Option<bool>,
    pub has_prescription: Option<bool>,
}

impl UpdatePatientReq {
    pub fn into_edit(self) -> CorridorResult<PatientEdit> {
        Ok(PatientEdit {
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
            status: self.status.as_deref().map(str::parse).transpose()?,
            situation: self.situation.as_deref().map(str::parse).transpose()?,
            pendency: self.pendency.as_deref().map(str::parse).transpose()?,
            has_bracelet: self.has_bracelet,
            has_bed_identification: self.has_bed_identification,
            has_prescription: self.has_prescription,
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OutcomeRes {
    /// `applied`, `unchanged` or `notFound`.
    pub outcome: String,
}

impl From<corridor_core::Outcome> for OutcomeRes {
    fn from(outcome: corridor_core::Outcome) -> Self {
        let outcome = match outcome {
            corridor_core::Outcome::Applied => "applied",
            corridor_core::Outcome::Unchanged => "unchanged",
            corridor_core::Outcome::NotFound => "notFound",
        };
        Self {
            outcome: outcome.into(),
        }
    }
}

// ============================================================================
// PENDENCIES
// ============================================================================

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntryDto {
    pub patient: PatientDto,
    pub buckets: Vec<String>,
    pub admin_state: Option<String>,
    pub suggested_action: Option<String>,
}

impl From<&Patient> for BoardEntryDto {
    fn from(p: &Patient) -> Self {
        Self {
            patient: PatientDto::from(p),
            buckets: pendency::buckets(p)
                .into_iter()
                .map(|b| b.as_str().to_string())
                .collect(),
            admin_state: pendency::admin_state(p).map(|s| s.as_str().to_string()),
            suggested_action: pendency::suggested_resolution(p).map(|r| r.name().to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PendencyBoardRes {
    pub safety: Vec<BoardEntryDto>,
    pub exams: Vec<BoardEntryDto>,
    pub prescription: Vec<BoardEntryDto>,
    pub admin: Vec<BoardEntryDto>,
}

impl From<&PendencyBoard> for PendencyBoardRes {
    fn from(board: &PendencyBoard) -> Self {
        let entries = |ps: &[Patient]| ps.iter().map(BoardEntryDto::from).collect();
        Self {
            safety: entries(&board.safety),
            exams: entries(&board.exams),
            prescription: entries(&board.prescription),
            admin: entries(&board.admin),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ResolveReq {
    /// `safety`, `diet`, `prescription`, `exams`, `socialWorker` or `finalizeDischarge`.
    pub action: String,
    /// Diet tags for the `diet` action. Empty records the default diet.
    pub diet: Vec<String>,
}

// ============================================================================
// TRANSFERS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferReq {
    pub sector: String,
    pub bed: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FinalizeTransferReq {
    /// Receiving facility. Required for external transfers.
    pub destination: Option<String>,
}

// ============================================================================
// BULK
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct BulkReq {
    pub ids: Vec<String>,
}

impl BulkReq {
    pub fn patient_ids(&self) -> Vec<PatientId> {
        self.ids.iter().map(|id| PatientId::new(id.trim())).collect()
    }
}

fn id_strings(ids: &[PatientId]) -> Vec<String> {
    ids.iter().map(PatientId::to_string).collect()
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDischargeRes {
    pub discharged: Vec<String>,
    pub already_finalized: Vec<String>,
    pub missing: Vec<String>,
    pub bypassed_admin_gate: Vec<String>,
}

impl From<BulkDischargeReport> for BulkDischargeRes {
    fn from(r: BulkDischargeReport) -> Self {
        Self {
            discharged: id_strings(&r.discharged),
            already_finalized: id_strings(&r.already_finalized),
            missing: id_strings(&r.missing),
            bypassed_admin_gate: id_strings(&r.bypassed_admin_gate),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteRes {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
}

impl From<BulkDeleteReport> for BulkDeleteRes {
    fn from(r: BulkDeleteReport) -> Self {
        Self {
            deleted: id_strings(&r.deleted),
            missing: id_strings(&r.missing),
        }
    }
}

// ============================================================================
// READ MODELS
// ============================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SpecialtyCountDto {
    pub specialty: String,
    pub count: usize,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsRes {
    pub active: usize,
    pub admitted: usize,
    pub observation: usize,
    pub reassessment: usize,
    pub discharged: usize,
    pub transfer_requested: usize,
    pub with_pendency: usize,
    pub stretchers: usize,
    pub chairs: usize,
    pub bottlenecks: usize,
    pub specialties: Vec<SpecialtyCountDto>,
}

impl From<CorridorStats> for StatsRes {
    fn from(s: CorridorStats) -> Self {
        Self {
            active: s.active,
            admitted: s.admitted,
            observation: s.observation,
            reassessment: s.reassessment,
            discharged: s.discharged,
            transfer_requested: s.transfer_requested,
            with_pendency: s.with_pendency,
            stretchers: s.stretchers,
            chairs: s.chairs,
            bottlenecks: s.bottlenecks,
            specialties: s
                .specialties
                .into_iter()
                .map(|c| SpecialtyCountDto {
                    specialty: c.specialty,
                    count: c.count,
                })
                .collect(),
        }
    }
}

// ============================================================================
// ADVISORY
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PrioritiesReq {
    pub chairs_only: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriorityEntryDto {
    pub patient: PatientDto,
    pub priority_score: Option<u8>,
    pub clinical_insight: Option<String>,
}

impl From<&Prioritized> for PriorityEntryDto {
    fn from(p: &Prioritized) -> Self {
        Self {
            patient: PatientDto::from(&p.patient),
            priority_score: p.score,
            clinical_insight: p.rationale.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PrioritiesRes {
    /// `ranked`, `unavailable` or `stale`.
    pub status: String,
    pub reason: Option<String>,
    pub entries: Vec<PriorityEntryDto>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SummaryRes {
    pub available: bool,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HandoverParams {
    /// Corridor name, matched case-insensitively.
    pub corridor: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HandoverRes {
    pub corridor: String,
    pub available: bool,
    pub handover: Option<String>,
}
