//! # Corridor service
//!
//! [`CorridorService`] is the entry point used by the REST API and the CLI. It wires the
//! record store, the clock and the advisory collaborator to the pure modules:
//!
//! - every single-record action loads the record, applies a pure transition and saves
//!   the record only when the transition reports [`Outcome::Applied`],
//! - an unknown id on update or delete is [`Outcome::NotFound`], not an error,
//! - a rejected action (validation or guard) leaves the stored record untouched.
//!
//! The service is cheap to clone; all collaborators sit behind `Arc`s.

use crate::advisory::{
    self, AdvisoryGate, AdvisoryInput, AdvisoryOutcome, AdvisoryService, DisabledAdvisory,
    EligibilityFilter, NarrativeRequest,
};
use crate::bulk::{BulkCoordinator, BulkDeleteReport, BulkDischargeReport};
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::model::{NewPatient, Outcome, Patient, PatientEdit, PatientId};
use crate::pendency::{self, PendencyBoard, Resolution};
use crate::projection::{self, CorridorStats, ListQuery};
use crate::store::PatientStore;
use crate::transfer::{self, TransferRequest};
use crate::{CorridorError, CorridorResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct CorridorService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn PatientStore>,
    clock: Arc<dyn Clock>,
    advisory: Arc<dyn AdvisoryService>,
    gate: Arc<AdvisoryGate>,
}

impl CorridorService {
    /// Service on the system clock with no advisory collaborator.
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn PatientStore>) -> Self {
        Self {
            cfg,
            store,
            clock: Arc::new(SystemClock),
            advisory: Arc::new(DisabledAdvisory),
            gate: Arc::new(AdvisoryGate::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryService>) -> Self {
        self.advisory = advisory;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    fn mutate<F>(&self, id: &PatientId, action: &str, apply: F) -> CorridorResult<Outcome>
    where
        F: FnOnce(&mut Patient, DateTime<Utc>) -> CorridorResult<Outcome>,
    {
        let Some(mut patient) = self.store.load_patient(id)? else {
            tracing::debug!("{}: no patient {}", action, id);
            return Ok(Outcome::NotFound);
        };

        let outcome = apply(&mut patient, self.clock.now())?;
        match outcome {
            Outcome::Applied => {
                self.store.save_patient(&patient)?;
                tracing::info!("{} applied to {}", action, id);
            }
            Outcome::Unchanged => tracing::debug!("{}: {} already in target state", action, id),
            Outcome::NotFound => {}
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    pub fn list(&self, query: &ListQuery) -> CorridorResult<Vec<Patient>> {
        let patients = self.store.load_all_patients()?;
        Ok(projection::project(&patients, query)
            .into_iter()
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`CorridorError::NotFound`] for an unknown id.
    pub fn get(&self, id: &PatientId) -> CorridorResult<Patient> {
        self.store
            .load_patient(id)?
            .ok_or_else(|| CorridorError::NotFound(id.to_string()))
    }

    pub fn admit(&self, input: NewPatient) -> CorridorResult<Patient> {
        let patient = Patient::admit(input, self.clock.now())?;
        self.store.save_patient(&patient)?;
        tracing::info!("admitted patient {}", patient.id);
        Ok(patient)
    }

    pub fn edit(&self, id: &PatientId, edit: PatientEdit) -> CorridorResult<Outcome> {
        self.mutate(id, "edit", |p, _| edit.apply(p))
    }

    /// Permanently removes one record.
    pub fn delete(&self, id: &PatientId) -> CorridorResult<Outcome> {
        if self.store.load_patient(id)?.is_none() {
            tracing::debug!("delete: no patient {}", id);
            return Ok(Outcome::NotFound);
        }
        self.store.delete_patients(std::slice::from_ref(id))?;
        tracing::info!("deleted patient {}", id);
        Ok(Outcome::Applied)
    }

    // ------------------------------------------------------------------------
    // Pendencies
    // ------------------------------------------------------------------------

    pub fn pendency_board(&self) -> CorridorResult<PendencyBoard> {
        Ok(pendency::classify(&self.store.load_all_patients()?))
    }

    pub fn resolve(&self, id: &PatientId, resolution: Resolution) -> CorridorResult<Outcome> {
        let action = format!("resolution {}", resolution.name());
        self.mutate(id, &action, |p, now| {
            pendency::apply_resolution(p, resolution, now)
        })
    }

    // ------------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------------

    pub fn request_transfer(
        &self,
        id: &PatientId,
        request: &TransferRequest,
    ) -> CorridorResult<Outcome> {
        self.mutate(id, "request transfer", |p, _| {
            transfer::request_transfer(p, request)
        })
    }

    /// Finalizes through whichever sub-flow the status calls for.
    pub fn finalize_transfer(
        &self,
        id: &PatientId,
        destination: Option<&str>,
    ) -> CorridorResult<Outcome> {
        self.mutate(id, "finalize transfer", |p, now| {
            transfer::finalize_transfer(p, destination, now)
        })
    }

    pub fn finalize_external_transfer(
        &self,
        id: &PatientId,
        destination: &str,
    ) -> CorridorResult<Outcome> {
        self.mutate(id, "finalize external transfer", |p, now| {
            transfer::finalize_external_transfer(p, destination, now)
        })
    }

    pub fn cancel_transfer(&self, id: &PatientId) -> CorridorResult<Outcome> {
        self.mutate(id, "cancel transfer", |p, _| transfer::cancel_transfer(p))
    }

    // ------------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------------

    pub fn bulk_discharge(&self, ids: &[PatientId]) -> CorridorResult<BulkDischargeReport> {
        BulkCoordinator::new(self.store.as_ref()).discharge(ids, self.clock.now())
    }

    pub fn bulk_delete(&self, ids: &[PatientId]) -> CorridorResult<BulkDeleteReport> {
        BulkCoordinator::new(self.store.as_ref()).delete(ids)
    }

    // ------------------------------------------------------------------------
    // Read models
    // ------------------------------------------------------------------------

    pub fn stats(&self) -> CorridorResult<CorridorStats> {
        Ok(projection::corridor_stats(&self.store.load_all_patients()?))
    }

    pub fn stale_venous_access(&self) -> CorridorResult<Vec<Patient>> {
        let patients = self.store.load_all_patients()?;
        Ok(projection::stale_venous_access(
            &patients,
            self.clock.local_now(),
            self.cfg.venous_access_limit(),
        )
        .into_iter()
        .cloned()
        .collect())
    }

    pub fn recent_admissions(&self) -> CorridorResult<Vec<Patient>> {
        let patients = self.store.load_all_patients()?;
        Ok(projection::recent_admissions(
            &patients,
            self.clock.now(),
            self.cfg.new_record_ttl(),
        )
        .into_iter()
        .cloned()
        .collect())
    }

    // ------------------------------------------------------------------------
    // Advisory
    // ------------------------------------------------------------------------

    fn advisory_candidates(
        &self,
        filter: EligibilityFilter,
    ) -> CorridorResult<(Vec<Patient>, Vec<AdvisoryInput>, String)> {
        let patients = self.store.load_all_patients()?;
        let candidates: Vec<Patient> = advisory::eligible(&patients, filter)
            .into_iter()
            .cloned()
            .collect();
        let inputs: Vec<AdvisoryInput> = candidates.iter().map(AdvisoryInput::from).collect();
        let fingerprint = advisory::fingerprint(&inputs)?;
        Ok((candidates, inputs, fingerprint))
    }

    /// Ranks the eligible patients with the advisory scorer.
    ///
    /// Advisory failures never surface as errors: they yield
    /// [`AdvisoryOutcome::Unavailable`] with the patients in list order. A response that
    /// arrives after the eligible set changed, or after a newer request started, is
    /// dropped as [`AdvisoryOutcome::Stale`].
    pub async fn prioritize(&self, filter: EligibilityFilter) -> CorridorResult<AdvisoryOutcome> {
        let (candidates, inputs, fingerprint) = self.advisory_candidates(filter)?;
        let ticket = self.gate.begin(fingerprint);

        let response =
            advisory::request_scores(self.advisory.as_ref(), &inputs, self.cfg.advisory_timeout())
                .await;

        let (_, _, current) = self.advisory_candidates(filter)?;
        if !self.gate.is_current(&ticket, &current) {
            tracing::warn!(
                "discarding advisory response for generation {}: input set changed",
                ticket.generation()
            );
            return Ok(AdvisoryOutcome::Stale);
        }

        Ok(match response {
            Ok(scores) => AdvisoryOutcome::Ranked(advisory::prioritize(candidates, scores)),
            Err(e) => {
                tracing::warn!("advisory scoring unavailable: {}", e);
                AdvisoryOutcome::Unavailable {
                    reason: e.to_string(),
                    unranked: advisory::prioritize(candidates, Vec::new()),
                }
            }
        })
    }

    /// Drops any prioritization still in flight.
    pub fn cancel_prioritization(&self) {
        self.gate.invalidate();
    }

    /// Narrative summary of the corridor, `None` when the advisory service is unavailable.
    pub async fn summarize(&self) -> CorridorResult<Option<String>> {
        let stats = self.stats()?;
        Ok(advisory::request_narrative(
            self.advisory.as_ref(),
            NarrativeRequest::Summary(&stats),
            self.cfg.advisory_timeout(),
        )
        .await)
    }

    /// Shift handover narrative for the active patients of one corridor.
    ///
    /// The corridor name matches trimmed and case-insensitively. Returns `None` when the
    /// corridor is empty (no request is made) or the advisory service is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if `corridor` is blank.
    pub async fn handover(&self, corridor: &str) -> CorridorResult<Option<String>> {
        let corridor = corridor.trim();
        if corridor.is_empty() {
            return Err(CorridorError::Validation("corridor cannot be empty".into()));
        }

        let inputs: Vec<AdvisoryInput> = self
            .store
            .load_all_patients()?
            .iter()
            .filter(|p| p.is_active() && p.corridor.trim().eq_ignore_ascii_case(corridor))
            .map(AdvisoryInput::from)
            .collect();
        if inputs.is_empty() {
            tracing::debug!("no active patients in {}, skipping handover", corridor);
            return Ok(None);
        }

        Ok(advisory::request_narrative(
            self.advisory.as_ref(),
            NarrativeRequest::Handover {
                corridor,
                patients: &inputs,
            },
            self.cfg.advisory_timeout(),
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisoryScore;
    use crate::clock::FixedClock;
    use crate::model::fixtures::{at, patient};
    use crate::model::{Pendency, Situation, Status, TransferPhase};
    use crate::store::{JsonFileStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        at(2024, 1, 12, 10, 0)
    }

    fn service_with(store: Arc<dyn PatientStore>) -> CorridorService {
        let cfg = Arc::new(CoreConfig::with_defaults("patient_data").unwrap());
        CorridorService::new(cfg, store).with_clock(Arc::new(FixedClock(now())))
    }

    fn memory_service(patients: Vec<Patient>) -> (Arc<MemoryStore>, CorridorService) {
        let store = Arc::new(MemoryStore::with_patients(patients));
        let service = service_with(store.clone());
        (store, service)
    }

    /// Scores every input by age.
    struct AgeScorer;

    #[async_trait]
    impl AdvisoryService for AgeScorer {
        async fn score(&self, inputs: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
            Ok(inputs
                .iter()
                .map(|i| AdvisoryScore {
                    id: i.id.clone(),
                    score: f64::from(i.age.unwrap_or(0)),
                    rationale: "age".into(),
                })
                .collect())
        }

        async fn narrate(&self, request: NarrativeRequest<'_>) -> CorridorResult<String> {
            Ok(match request {
                NarrativeRequest::Summary(stats) => {
                    format!("{} patients in the corridor", stats.active)
                }
                NarrativeRequest::Handover { corridor, patients } => {
                    format!("{corridor}: {} patients", patients.len())
                }
            })
        }
    }

    /// Remembers what each handover request carried.
    #[derive(Default)]
    struct RecordingNarrator(Mutex<Vec<(String, Vec<AdvisoryInput>)>>);

    #[async_trait]
    impl AdvisoryService for RecordingNarrator {
        async fn score(&self, _: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
            Ok(Vec::new())
        }

        async fn narrate(&self, request: NarrativeRequest<'_>) -> CorridorResult<String> {
            if let NarrativeRequest::Handover { corridor, patients } = request {
                self.0
                    .lock()
                    .unwrap()
                    .push((corridor.to_string(), patients.to_vec()));
            }
            Ok("handover".into())
        }
    }

    /// Edits a record while the request is in flight.
    struct MeddlingScorer(Arc<MemoryStore>);

    #[async_trait]
    impl AdvisoryService for MeddlingScorer {
        async fn score(&self, inputs: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
            let mut p = self.0.load_patient(&inputs[0].id)?.unwrap();
            p.notes = "new symptoms".into();
            self.0.save_patient(&p)?;
            Ok(Vec::new())
        }

        async fn narrate(&self, _: NarrativeRequest<'_>) -> CorridorResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn admit_then_edit_through_file_store() {
        let temp = TempDir::new().unwrap();
        let cfg = Arc::new(CoreConfig::with_defaults(temp.path()).unwrap());
        let store = Arc::new(JsonFileStore::open(&cfg).unwrap());
        let service = CorridorService::new(cfg, store).with_clock(Arc::new(FixedClock(now())));

        let admitted = service
            .admit(NewPatient {
                name: "Maria Souza".into(),
                venous_access: "MSD 01/01".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(admitted.created_at, now());
        assert_eq!(service.recent_admissions().unwrap().len(), 1);

        let outcome = service
            .edit(
                &admitted.id,
                PatientEdit {
                    pendency: Some(Pendency::NoDiet),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(service.get(&admitted.id).unwrap().pendency, Pendency::NoDiet);

        assert_eq!(service.stale_venous_access().unwrap().len(), 1);
    }

    #[test]
    fn unknown_ids_are_no_op_successes() {
        let (_, service) = memory_service(vec![]);
        let ghost = PatientId::new("ghost");

        assert_eq!(service.cancel_transfer(&ghost).unwrap(), Outcome::NotFound);
        assert_eq!(
            service.resolve(&ghost, Resolution::Safety).unwrap(),
            Outcome::NotFound
        );
        assert_eq!(service.delete(&ghost).unwrap(), Outcome::NotFound);
        assert!(matches!(
            service.get(&ghost),
            Err(CorridorError::NotFound(_))
        ));
    }

    #[test]
    fn rejected_action_leaves_store_untouched() {
        let mut p = patient("a", "Ana");
        p.status = Status::TransferExternal;
        let (store, service) = memory_service(vec![p.clone()]);

        let err = service
            .finalize_external_transfer(&p.id, "  ")
            .unwrap_err();
        assert!(matches!(err, CorridorError::Validation(_)));
        assert_eq!(store.load_patient(&p.id).unwrap(), Some(p));
    }

    #[test]
    fn transfer_lifecycle_is_persisted() {
        let (store, service) = memory_service(vec![patient("a", "Ana")]);
        let id = PatientId::new("a");
        let request = TransferRequest::new("ward 2", "7").unwrap();

        assert_eq!(
            service.request_transfer(&id, &request).unwrap(),
            Outcome::Applied
        );
        assert_eq!(
            service.request_transfer(&id, &request).unwrap(),
            Outcome::Unchanged
        );
        assert_eq!(
            service.finalize_transfer(&id, None).unwrap(),
            Outcome::Applied
        );

        let stored = store.load_patient(&id).unwrap().unwrap();
        assert_eq!(stored.phase(), TransferPhase::Finalized { at: now() });
        assert!(service.list(&ListQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn board_and_resolution_round_trip() {
        let mut p = patient("a", "Ana");
        p.pendency = Pendency::NoDiet;
        let (_, service) = memory_service(vec![p]);

        assert_eq!(service.pendency_board().unwrap().prescription.len(), 1);
        service
            .resolve(&PatientId::new("a"), Resolution::Diet(vec![]))
            .unwrap();
        let board = service.pendency_board().unwrap();
        assert!(board.prescription.is_empty());
        assert_eq!(service.get(&PatientId::new("a")).unwrap().diet, vec!["Free"]);
    }

    #[test]
    fn bulk_operations_go_through_the_coordinator() {
        let (store, service) = memory_service(vec![patient("a", "Ana"), patient("b", "Bruno")]);

        let report = service.bulk_discharge(&[PatientId::new("a")]).unwrap();
        assert_eq!(report.discharged, vec![PatientId::new("a")]);
        assert_eq!(service.stats().unwrap().active, 1);

        service.bulk_delete(&[PatientId::new("b")]).unwrap();
        assert_eq!(store.load_all_patients().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prioritize_without_advisory_falls_back_to_list_order() {
        let (_, service) = memory_service(vec![patient("a", "Ana"), patient("b", "Bruno")]);

        match service.prioritize(EligibilityFilter::All).await.unwrap() {
            AdvisoryOutcome::Unavailable { unranked, .. } => {
                let ids: Vec<_> = unranked.iter().map(|p| p.patient.id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(service.summarize().await.unwrap(), None);
    }

    #[tokio::test]
    async fn prioritize_ranks_by_score() {
        let mut young = patient("a", "Ana");
        young.age = Some(30);
        let mut old = patient("b", "Bruno");
        old.age = Some(85);
        old.situation = Situation::Chair;
        let (_, service) = memory_service(vec![young, old]);
        let service = service.with_advisory(Arc::new(AgeScorer));

        match service.prioritize(EligibilityFilter::All).await.unwrap() {
            AdvisoryOutcome::Ranked(ranked) => {
                assert_eq!(ranked[0].patient.id.as_str(), "b");
                assert_eq!(ranked[0].score, Some(85));
            }
            other => panic!("expected ranking, got {other:?}"),
        }

        match service.prioritize(EligibilityFilter::ChairsOnly).await.unwrap() {
            AdvisoryOutcome::Ranked(ranked) => assert_eq!(ranked.len(), 1),
            other => panic!("expected ranking, got {other:?}"),
        }

        assert_eq!(
            service.summarize().await.unwrap().as_deref(),
            Some("2 patients in the corridor")
        );
    }

    #[tokio::test]
    async fn response_for_changed_input_set_is_discarded() {
        let (store, service) = memory_service(vec![patient("a", "Ana")]);
        let service = service.with_advisory(Arc::new(MeddlingScorer(store.clone())));

        assert_eq!(
            service.prioritize(EligibilityFilter::All).await.unwrap(),
            AdvisoryOutcome::Stale
        );
    }

    #[tokio::test]
    async fn handover_covers_active_patients_of_one_corridor() {
        let mut finalized = patient("b", "Bruno");
        finalized.transfer.phase = TransferPhase::Finalized { at: now() };
        let mut elsewhere = patient("c", "Carla");
        elsewhere.corridor = "Corridor 2".into();
        let mut requested = patient("d", "Davi");
        requested.transfer.phase = TransferPhase::Requested;
        requested.notes = "awaiting bed".into();

        let (_, service) =
            memory_service(vec![patient("a", "Ana"), finalized, elsewhere, requested]);
        let narrator = Arc::new(RecordingNarrator::default());
        let service = service.with_advisory(narrator.clone());

        assert_eq!(
            service.handover(" corridor 1 ").await.unwrap().as_deref(),
            Some("handover")
        );

        let calls = narrator.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (corridor, inputs) = &calls[0];
        assert_eq!(corridor, "corridor 1");
        let ids: Vec<_> = inputs.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(inputs[1].notes, "awaiting bed");
    }

    #[tokio::test]
    async fn handover_for_empty_corridor_makes_no_request() {
        let (_, service) = memory_service(vec![patient("a", "Ana")]);
        let narrator = Arc::new(RecordingNarrator::default());
        let service = service.with_advisory(narrator.clone());

        assert_eq!(service.handover("Corridor 9").await.unwrap(), None);
        assert!(narrator.0.lock().unwrap().is_empty());

        assert!(matches!(
            service.handover("   ").await,
            Err(CorridorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn handover_without_advisory_degrades() {
        let (_, service) = memory_service(vec![patient("a", "Ana")]);
        assert_eq!(service.handover("Corridor 1").await.unwrap(), None);

        let service = service.with_advisory(Arc::new(AgeScorer));
        assert_eq!(
            service.handover("Corridor 1").await.unwrap().as_deref(),
            Some("Corridor 1: 1 patients")
        );
    }
}
