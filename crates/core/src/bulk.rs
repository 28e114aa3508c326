//! Bulk operations over a selected id set.
//!
//! Both mutators are all or nothing from the caller's point of view. Discharge computes
//! every transition in memory and hands the changed records to the store as one batch;
//! delete hands the whole id list to the store's atomic delete. Ids that no longer exist
//! are reported, not treated as errors.
//!
//! Bulk discharge finalizes records straight past the Admin pendency gate that
//! [`crate::pendency::finalize_discharge`] applies. It goes through
//! [`discharge_override`] and every batch is written to the `audit` log target.

use crate::model::{Outcome, Patient, PatientId, Pendency, Status, TransferPhase};
use crate::store::PatientStore;
use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Coordinator override: discharge and finalize in one step, regardless of status or
/// open pendencies. An already finalized record is left alone.
pub fn discharge_override(patient: &mut Patient, now: DateTime<Utc>) -> Outcome {
    if patient.is_finalized() {
        return Outcome::Unchanged;
    }
    patient.status = Status::Discharged;
    patient.transfer.phase = TransferPhase::Finalized { at: now };
    Outcome::Applied
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDischargeReport {
    pub discharged: Vec<PatientId>,
    pub already_finalized: Vec<PatientId>,
    pub missing: Vec<PatientId>,
    /// Discharged while a social-work review was still open.
    pub bypassed_admin_gate: Vec<PatientId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted: Vec<PatientId>,
    pub missing: Vec<PatientId>,
}

/// Rejects an empty list and drops repeated ids, keeping first-seen order.
fn distinct_ids(ids: &[PatientId]) -> CorridorResult<Vec<PatientId>> {
    if ids.is_empty() {
        return Err(CorridorError::Validation(
            "bulk operation needs at least one patient id".into(),
        ));
    }
    let mut seen = BTreeSet::new();
    Ok(ids
        .iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect())
}

pub struct BulkCoordinator<'a> {
    store: &'a dyn PatientStore,
}

impl<'a> BulkCoordinator<'a> {
    pub fn new(store: &'a dyn PatientStore) -> Self {
        Self { store }
    }

    /// Discharges and finalizes every listed record.
    ///
    /// # Errors
    ///
    /// - [`CorridorError::Validation`] if `ids` is empty.
    /// - Any store error; in that case no record was changed.
    pub fn discharge(
        &self,
        ids: &[PatientId],
        now: DateTime<Utc>,
    ) -> CorridorResult<BulkDischargeReport> {
        let ids = distinct_ids(ids)?;
        let mut by_id: HashMap<PatientId, Patient> = self
            .store
            .load_all_patients()?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut report = BulkDischargeReport::default();
        let mut changed = Vec::new();

        for id in ids {
            let Some(mut patient) = by_id.remove(&id) else {
                report.missing.push(id);
                continue;
            };
            let social_open = patient.pendency == Pendency::AwaitingSocialWorker;
            match discharge_override(&mut patient, now) {
                Outcome::Applied => {
                    if social_open {
                        report.bypassed_admin_gate.push(id.clone());
                    }
                    report.discharged.push(id);
                    changed.push(patient);
                }
                _ => report.already_finalized.push(id),
            }
        }

        if !changed.is_empty() {
            self.store.save_patients(&changed)?;
        }

        for id in &report.bypassed_admin_gate {
            tracing::warn!(
                "bulk discharge finalized {} with social-work review still open",
                id
            );
        }
        tracing::info!(
            target: "audit",
            discharged = report.discharged.len(),
            bypassed_admin_gate = report.bypassed_admin_gate.len(),
            already_finalized = report.already_finalized.len(),
            missing = report.missing.len(),
            ids = ?report.discharged,
            "bulk discharge override"
        );

        Ok(report)
    }

    /// Permanently removes every listed record in one store call.
    ///
    /// # Errors
    ///
    /// - [`CorridorError::Validation`] if `ids` is empty.
    /// - Any store error; in that case nothing was deleted.
    pub fn delete(&self, ids: &[PatientId]) -> CorridorResult<BulkDeleteReport> {
        let ids = distinct_ids(ids)?;
        let existing: BTreeSet<PatientId> = self
            .store
            .load_all_patients()?
            .into_iter()
            .map(|p| p.id)
            .collect();

        self.store.delete_patients(&ids)?;

        let (deleted, missing): (Vec<_>, Vec<_>) =
            ids.into_iter().partition(|id| existing.contains(id));
        tracing::info!(
            target: "audit",
            deleted = deleted.len(),
            missing = missing.len(),
            ids = ?deleted,
            "bulk delete"
        );

        Ok(BulkDeleteReport { deleted, missing })
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Caller-side selection of record ids. Never touches records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<PatientId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: PatientId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Selects every visible id, or clears them if they are all selected already.
    pub fn toggle_all(&mut self, visible: &[PatientId]) {
        if !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id)) {
            for id in visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible.iter().cloned());
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops ids that are no longer visible, e.g. after the filter changed.
    pub fn retain_visible(&mut self, visible: &[PatientId]) {
        let visible: BTreeSet<&PatientId> = visible.iter().collect();
        self.ids.retain(|id| visible.contains(id));
    }

    pub fn contains(&self, id: &PatientId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<PatientId> {
        self.ids.iter().cloned().collect()
    }
}
