//! Pendency classification and resolution.
//!
//! A patient's blockers are read from three independent sources: the safety flags, the
//! single-valued `pendency` field, and the `Discharged` status. Classification therefore
//! yields a *set* of [`Bucket`]s per record, and one record can sit in several buckets
//! at once (a missing bracelet plus a missing prescription, for example).
//!
//! Resolutions are pure transitions over one record. They return an [`Outcome`] and leave
//! persistence to the caller.

use crate::constants::DEFAULT_DIET;
use crate::model::{Outcome, Patient, Pendency, Status, TransferPhase};
use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    Safety,
    Exams,
    Prescription,
    Admin,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Safety => "safety",
            Bucket::Exams => "exams",
            Bucket::Prescription => "prescription",
            Bucket::Admin => "admin",
        }
    }
}

/// Buckets a record belongs to. Finalized records belong to none.
pub fn buckets(patient: &Patient) -> BTreeSet<Bucket> {
    let mut tags = BTreeSet::new();
    if patient.is_finalized() {
        return tags;
    }

    if patient.has_safety_gap() {
        tags.insert(Bucket::Safety);
    }
    if patient.pendency.is_exam() {
        tags.insert(Bucket::Exams);
    }
    if patient.pendency.is_prescription() {
        tags.insert(Bucket::Prescription);
    }
    if patient.pendency == Pendency::AwaitingSocialWorker || patient.status == Status::Discharged
    {
        tags.insert(Bucket::Admin);
    }
    tags
}

/// How an Admin-bucket record is waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdminState {
    /// Social-work review open, not yet discharged.
    AwaitingSocialWorker,
    /// Discharged, but social-work review still open.
    DischargedAwaitingSocialWorker,
    /// Discharged with nothing administrative left; only the finalize step remains.
    ReadyToFinalizeDischarge,
}

impl AdminState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminState::AwaitingSocialWorker => "awaitingSocialWorker",
            AdminState::DischargedAwaitingSocialWorker => "dischargedAwaitingSocialWorker",
            AdminState::ReadyToFinalizeDischarge => "readyToFinalizeDischarge",
        }
    }
}

pub fn admin_state(patient: &Patient) -> Option<AdminState> {
    if patient.is_finalized() {
        return None;
    }
    let social = patient.pendency == Pendency::AwaitingSocialWorker;
    match (patient.status == Status::Discharged, social) {
        (true, true) => Some(AdminState::DischargedAwaitingSocialWorker),
        (true, false) => Some(AdminState::ReadyToFinalizeDischarge),
        (false, true) => Some(AdminState::AwaitingSocialWorker),
        (false, false) => None,
    }
}

/// The four buckets over the active subset. Buckets overlap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendencyBoard {
    pub safety: Vec<Patient>,
    pub exams: Vec<Patient>,
    pub prescription: Vec<Patient>,
    pub admin: Vec<Patient>,
}

impl PendencyBoard {
    pub fn bucket(&self, bucket: Bucket) -> &[Patient] {
        match bucket {
            Bucket::Safety => &self.safety,
            Bucket::Exams => &self.exams,
            Bucket::Prescription => &self.prescription,
            Bucket::Admin => &self.admin,
        }
    }

    /// Number of distinct records with at least one bucket.
    pub fn distinct_len(&self) -> usize {
        let ids: BTreeSet<_> = [&self.safety, &self.exams, &self.prescription, &self.admin]
            .into_iter()
            .flatten()
            .map(|p| &p.id)
            .collect();
        ids.len()
    }
}

pub fn classify(patients: &[Patient]) -> PendencyBoard {
    let mut board = PendencyBoard::default();
    for patient in patients {
        for bucket in buckets(patient) {
            let target = match bucket {
                Bucket::Safety => &mut board.safety,
                Bucket::Exams => &mut board.exams,
                Bucket::Prescription => &mut board.prescription,
                Bucket::Admin => &mut board.admin,
            };
            target.push(patient.clone());
        }
    }
    board
}

// ============================================================================
// RESOLUTION ACTIONS
// ============================================================================

/// A single resolution action, as chosen by a caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Safety,
    /// Diet tags to record. Empty means the default diet.
    Diet(Vec<String>),
    Prescription,
    Exams,
    SocialWorker,
    FinalizeDischarge,
}

impl Resolution {
    /// Builds a resolution from an action name such as `diet` or `finalize-discharge`.
    /// `diet` is only read for the diet action.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] for an unknown action.
    pub fn from_action(action: &str, diet: Vec<String>) -> CorridorResult<Self> {
        let key: String = action
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "safety" => Ok(Resolution::Safety),
            "diet" => Ok(Resolution::Diet(diet)),
            "prescription" => Ok(Resolution::Prescription),
            "exams" => Ok(Resolution::Exams),
            "socialworker" => Ok(Resolution::SocialWorker),
            "finalizedischarge" => Ok(Resolution::FinalizeDischarge),
            _ => Err(CorridorError::Validation(format!(
                "unknown resolution action: {action}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Safety => "safety",
            Resolution::Diet(_) => "diet",
            Resolution::Prescription => "prescription",
            Resolution::Exams => "exams",
            Resolution::SocialWorker => "socialWorker",
            Resolution::FinalizeDischarge => "finalizeDischarge",
        }
    }
}

fn ensure_pendency(
    patient: &Patient,
    action: &str,
    accepts: impl Fn(Pendency) -> bool,
) -> CorridorResult<()> {
    patient.ensure_not_finalized(action)?;
    if patient.pendency == Pendency::None || accepts(patient.pendency) {
        return Ok(());
    }
    Err(CorridorError::GuardViolation(format!(
        "cannot {action}: patient {} has pendency {}",
        patient.id, patient.pendency
    )))
}

/// Sets both safety identification flags.
pub fn resolve_safety(patient: &mut Patient) -> CorridorResult<Outcome> {
    patient.ensure_not_finalized("resolve safety")?;
    if !patient.has_safety_gap() {
        return Ok(Outcome::Unchanged);
    }
    patient.has_bracelet = true;
    patient.has_bed_identification = true;
    Ok(Outcome::Applied)
}

/// Records the diet and clears a `NoDiet` pendency.
///
/// Blank tags are dropped; an empty set records the default diet.
pub fn resolve_diet(patient: &mut Patient, tags: Vec<String>) -> CorridorResult<Outcome> {
    ensure_pendency(patient, "resolve diet", |p| p == Pendency::NoDiet)?;

    let mut diet: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if diet.is_empty() {
        diet.push(DEFAULT_DIET.to_string());
    }

    if patient.pendency == Pendency::None && patient.diet == diet {
        return Ok(Outcome::Unchanged);
    }
    patient.diet = diet;
    patient.pendency = Pendency::None;
    Ok(Outcome::Applied)
}

pub fn resolve_prescription(patient: &mut Patient) -> CorridorResult<Outcome> {
    ensure_pendency(patient, "resolve prescription", |p| {
        p == Pendency::NoMedicalPrescription
    })?;
    if patient.pendency == Pendency::None && patient.has_prescription {
        return Ok(Outcome::Unchanged);
    }
    patient.pendency = Pendency::None;
    patient.has_prescription = true;
    Ok(Outcome::Applied)
}

pub fn resolve_exams(patient: &mut Patient) -> CorridorResult<Outcome> {
    ensure_pendency(patient, "resolve exams", |p| p.is_exam())?;
    if patient.pendency == Pendency::None {
        return Ok(Outcome::Unchanged);
    }
    patient.pendency = Pendency::None;
    Ok(Outcome::Applied)
}

/// Clears the social-work pendency. Status is left alone.
pub fn resolve_social_worker(patient: &mut Patient) -> CorridorResult<Outcome> {
    ensure_pendency(patient, "resolve social worker", |p| {
        p == Pendency::AwaitingSocialWorker
    })?;
    if patient.pendency == Pendency::None {
        return Ok(Outcome::Unchanged);
    }
    patient.pendency = Pendency::None;
    Ok(Outcome::Applied)
}

/// Seals a discharge.
///
/// Permitted while a social-work pendency is still open; that case is logged to the
/// `audit` target. A record that is already finalized is left as is, so the original
/// `transferredAt` is kept.
///
/// # Errors
///
/// Returns [`CorridorError::GuardViolation`] if the status is not `Discharged`.
pub fn finalize_discharge(patient: &mut Patient, now: DateTime<Utc>) -> CorridorResult<Outcome> {
    if patient.is_finalized() {
        tracing::debug!("discharge of {} already finalized", patient.id);
        return Ok(Outcome::Unchanged);
    }
    if patient.status != Status::Discharged {
        return Err(CorridorError::GuardViolation(format!(
            "cannot finalize discharge: patient {} has status {}",
            patient.id, patient.status
        )));
    }

    if patient.pendency == Pendency::AwaitingSocialWorker {
        tracing::warn!(
            "finalizing discharge of {} with social-work review still open",
            patient.id
        );
        tracing::info!(
            target: "audit",
            patient = %patient.id,
            pendency = %patient.pendency,
            "discharge finalized over open pendency"
        );
    }

    patient.transfer.phase = TransferPhase::Finalized { at: now };
    Ok(Outcome::Applied)
}

pub fn apply_resolution(
    patient: &mut Patient,
    resolution: Resolution,
    now: DateTime<Utc>,
) -> CorridorResult<Outcome> {
    match resolution {
        Resolution::Safety => resolve_safety(patient),
        Resolution::Diet(tags) => resolve_diet(patient, tags),
        Resolution::Prescription => resolve_prescription(patient),
        Resolution::Exams => resolve_exams(patient),
        Resolution::SocialWorker => resolve_social_worker(patient),
        Resolution::FinalizeDischarge => finalize_discharge(patient, now),
    }
}

/// The primary action for a record on the board.
///
/// Safety comes first, then a pending discharge, then diet, prescription and whatever
/// pendency remains.
pub fn suggested_resolution(patient: &Patient) -> Option<Resolution> {
    if patient.is_finalized() {
        return None;
    }
    if patient.has_safety_gap() {
        return Some(Resolution::Safety);
    }
    if patient.status == Status::Discharged {
        return Some(Resolution::FinalizeDischarge);
    }
    match patient.pendency {
        Pendency::None => None,
        Pendency::NoDiet => Some(Resolution::Diet(Vec::new())),
        Pendency::NoMedicalPrescription => Some(Resolution::Prescription),
        Pendency::AwaitingSocialWorker => Some(Resolution::SocialWorker),
        _ => Some(Resolution::Exams),
    }
}
