//! Advisory collaborator seam.
//!
//! An external service scores corridor patients for priority and writes a narrative
//! summary. The core treats it as best effort:
//!
//! - calls are bounded by a timeout and every failure degrades to "no advisory data",
//! - returned scores may cover a subset or a superset of the patients sent,
//! - a response that arrives after the input set changed is discarded. [`AdvisoryGate`]
//!   tracks a generation number per request and a fingerprint of the input set.
//!
//! Narratives come in two kinds, see [`NarrativeRequest`]: a corridor-wide summary built
//! from aggregate counts, and a shift handover for the active patients of one corridor.
//!
//! Only the de-identified [`AdvisoryInput`] projection leaves the process.

use crate::model::{Patient, PatientId, Situation};
use crate::projection::CorridorStats;
use crate::{CorridorError, CorridorResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// What the advisory service is allowed to see about a patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryInput {
    pub id: PatientId,
    pub age: Option<u16>,
    pub diagnosis: String,
    pub mobility: String,
    pub disabilities: Vec<String>,
    pub situation: Situation,
    pub notes: String,
}

impl From<&Patient> for AdvisoryInput {
    fn from(p: &Patient) -> Self {
        Self {
            id: p.id.clone(),
            age: p.age,
            diagnosis: p.diagnosis.clone(),
            mobility: p.mobility.clone(),
            disabilities: p.disabilities.clone(),
            situation: p.situation,
            notes: p.notes.clone(),
        }
    }
}

/// One score as returned by the service. Scores outside 0..=100 are clamped on use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryScore {
    pub id: PatientId,
    #[serde(alias = "priorityScore")]
    pub score: f64,
    #[serde(default, alias = "clinicalInsight")]
    pub rationale: String,
}

/// What a narrative should be written about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NarrativeRequest<'a> {
    /// Overview of the whole corridor from its aggregate counts.
    Summary(&'a CorridorStats),
    /// Shift handover for the active patients of one corridor.
    Handover {
        corridor: &'a str,
        patients: &'a [AdvisoryInput],
    },
}

impl NarrativeRequest<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            NarrativeRequest::Summary(_) => "summary",
            NarrativeRequest::Handover { .. } => "handover",
        }
    }
}

#[async_trait]
pub trait AdvisoryService: Send + Sync {
    async fn score(&self, inputs: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>>;

    /// Free-text narrative for the request.
    async fn narrate(&self, request: NarrativeRequest<'_>) -> CorridorResult<String>;
}

/// Stand-in when no advisory service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledAdvisory;

#[async_trait]
impl AdvisoryService for DisabledAdvisory {
    async fn score(&self, _inputs: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
        Err(CorridorError::CollaboratorUnavailable(
            "advisory service is not configured".into(),
        ))
    }

    async fn narrate(&self, _request: NarrativeRequest<'_>) -> CorridorResult<String> {
        Err(CorridorError::CollaboratorUnavailable(
            "advisory service is not configured".into(),
        ))
    }
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EligibilityFilter {
    #[default]
    All,
    ChairsOnly,
}

/// Patients worth ranking: still in the corridor, no transfer under way, and not on an
/// auto-transfer status.
pub fn eligible(patients: &[Patient], filter: EligibilityFilter) -> Vec<&Patient> {
    patients
        .iter()
        .filter(|p| p.is_active() && !p.is_transfer_requested())
        .filter(|p| !p.status.is_auto_transfer())
        .filter(|p| filter == EligibilityFilter::All || p.situation == Situation::Chair)
        .collect()
}

/// Order-independent SHA-256 fingerprint of an input set, lowercase hex.
pub fn fingerprint(inputs: &[AdvisoryInput]) -> CorridorResult<String> {
    let mut sorted: Vec<&AdvisoryInput> = inputs.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let bytes = serde_json::to_vec(&sorted).map_err(CorridorError::Serialization)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

// ============================================================================
// STALE-RESPONSE GATE
// ============================================================================

/// Proof that a request was started against a particular input set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvisoryTicket {
    generation: u64,
    fingerprint: String,
}

impl AdvisoryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Shared between every request for the same advisory view. Starting a request or
/// calling [`AdvisoryGate::invalidate`] makes every earlier ticket stale.
#[derive(Debug, Default)]
pub struct AdvisoryGate {
    generation: AtomicU64,
}

impl AdvisoryGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, fingerprint: String) -> AdvisoryTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        AdvisoryTicket {
            generation,
            fingerprint,
        }
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// True if no newer request started and the input set still matches.
    pub fn is_current(&self, ticket: &AdvisoryTicket, current_fingerprint: &str) -> bool {
        ticket.generation == self.generation.load(Ordering::SeqCst)
            && ticket.fingerprint == current_fingerprint
    }
}

// ============================================================================
// PRIORITIZATION
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Prioritized {
    pub patient: Patient,
    pub score: Option<u8>,
    pub rationale: Option<String>,
}

fn clamp_score(raw: f64) -> Option<u8> {
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

/// Attaches scores and orders the patients: scored first by score descending, then the
/// unscored ones in their original order. Scores for unknown ids are ignored; if an id
/// is scored twice the first score wins.
pub fn prioritize(patients: Vec<Patient>, scores: Vec<AdvisoryScore>) -> Vec<Prioritized> {
    let mut by_id: HashMap<PatientId, (Option<u8>, String)> = HashMap::new();
    for s in scores {
        by_id
            .entry(s.id)
            .or_insert((clamp_score(s.score), s.rationale));
    }

    let mut ranked: Vec<Prioritized> = patients
        .into_iter()
        .map(|patient| {
            let (score, rationale) = match by_id.remove(&patient.id) {
                Some((score, rationale)) => {
                    let rationale = Some(rationale).filter(|r| !r.trim().is_empty());
                    (score, rationale)
                }
                None => (None, None),
            };
            Prioritized {
                patient,
                score,
                rationale,
            }
        })
        .collect();

    // Stable: equal scores and the unscored tail keep input order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Result of a prioritization request.
#[derive(Clone, Debug, PartialEq)]
pub enum AdvisoryOutcome {
    Ranked(Vec<Prioritized>),
    /// The service failed or timed out. Patients are listed in their original order.
    Unavailable {
        reason: String,
        unranked: Vec<Prioritized>,
    },
    /// The input set changed while the request was in flight; the response was dropped.
    Stale,
}

/// Calls the scorer with a deadline. Every failure is reported as
/// [`CorridorError::CollaboratorUnavailable`].
pub async fn request_scores(
    service: &dyn AdvisoryService,
    inputs: &[AdvisoryInput],
    timeout: Duration,
) -> CorridorResult<Vec<AdvisoryScore>> {
    match tokio::time::timeout(timeout, service.score(inputs)).await {
        Ok(Ok(scores)) => Ok(scores),
        Ok(Err(CorridorError::CollaboratorUnavailable(reason))) => {
            Err(CorridorError::CollaboratorUnavailable(reason))
        }
        Ok(Err(other)) => Err(CorridorError::CollaboratorUnavailable(other.to_string())),
        Err(_) => Err(CorridorError::CollaboratorUnavailable(format!(
            "no response within {}s",
            timeout.as_secs_f32()
        ))),
    }
}

/// Narrative text, or `None` if the service is unavailable.
pub async fn request_narrative(
    service: &dyn AdvisoryService,
    request: NarrativeRequest<'_>,
    timeout: Duration,
) -> Option<String> {
    let kind = request.kind();
    match tokio::time::timeout(timeout, service.narrate(request)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            tracing::warn!("advisory {} unavailable: {}", kind, e);
            None
        }
        Err(_) => {
            tracing::warn!("advisory {} timed out", kind);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::patient;
    use crate::model::{Status, TransferPhase};

    fn score(id: &str, score: f64) -> AdvisoryScore {
        AdvisoryScore {
            id: PatientId::new(id),
            score,
            rationale: format!("rationale for {id}"),
        }
    }

    fn ids(ranked: &[Prioritized]) -> Vec<&str> {
        ranked.iter().map(|p| p.patient.id.as_str()).collect()
    }

    struct SlowAdvisory;

    #[async_trait]
    impl AdvisoryService for SlowAdvisory {
        async fn score(&self, _: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn narrate(&self, _: NarrativeRequest<'_>) -> CorridorResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    struct BrokenAdvisory;

    #[async_trait]
    impl AdvisoryService for BrokenAdvisory {
        async fn score(&self, _: &[AdvisoryInput]) -> CorridorResult<Vec<AdvisoryScore>> {
            Err(CorridorError::InvalidRecord("garbled reply".into()))
        }

        async fn narrate(&self, _: NarrativeRequest<'_>) -> CorridorResult<String> {
            Err(CorridorError::InvalidRecord("garbled reply".into()))
        }
    }

    #[test]
    fn eligibility_excludes_transfers_and_auto_statuses() {
        let mut requested = patient("b", "Bruno");
        requested.transfer.phase = TransferPhase::Requested;
        let mut external = patient("c", "Carla");
        external.status = Status::TransferExternal;
        let mut chair = patient("d", "Davi");
        chair.situation = Situation::Chair;

        let all = vec![patient("a", "Ana"), requested, external, chair];
        let picked: Vec<_> = eligible(&all, EligibilityFilter::All)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(picked, vec!["a", "d"]);

        let chairs = eligible(&all, EligibilityFilter::ChairsOnly);
        assert_eq!(chairs.len(), 1);
        assert_eq!(chairs[0].id.as_str(), "d");
    }

    #[test]
    fn prioritize_orders_scored_then_unscored() {
        let patients = vec![
            patient("a", "Ana"),
            patient("b", "Bruno"),
            patient("c", "Carla"),
            patient("d", "Davi"),
        ];
        let scores = vec![
            score("c", 40.0),
            score("ghost", 99.0),
            score("b", 250.0),
            score("c", 90.0),
        ];

        let ranked = prioritize(patients, scores);
        assert_eq!(ids(&ranked), vec!["b", "c", "a", "d"]);
        assert_eq!(ranked[0].score, Some(100));
        assert_eq!(ranked[1].score, Some(40));
        assert_eq!(ranked[2].score, None);
        assert_eq!(ranked[2].rationale, None);
    }

    #[test]
    fn non_finite_scores_count_as_unscored() {
        let ranked = prioritize(
            vec![patient("a", "Ana"), patient("b", "Bruno")],
            vec![score("a", f64::NAN), score("b", -3.0)],
        );
        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert_eq!(ranked[0].score, Some(0));
        assert_eq!(ranked[1].score, None);
    }

    #[test]
    fn fingerprint_ignores_order_but_not_content() {
        let a = AdvisoryInput::from(&patient("a", "Ana"));
        let b = AdvisoryInput::from(&patient("b", "Bruno"));
        let forward = fingerprint(&[a.clone(), b.clone()]).unwrap();
        let backward = fingerprint(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 64);

        let mut changed = b;
        changed.notes = "fever".into();
        assert_ne!(forward, fingerprint(&[a, changed]).unwrap());
    }

    #[test]
    fn gate_rejects_superseded_or_changed_requests() {
        let gate = AdvisoryGate::new();
        let first = gate.begin("fp-1".into());
        assert!(gate.is_current(&first, "fp-1"));
        assert!(!gate.is_current(&first, "fp-2"));

        let second = gate.begin("fp-1".into());
        assert!(!gate.is_current(&first, "fp-1"));
        assert!(gate.is_current(&second, "fp-1"));

        gate.invalidate();
        assert!(!gate.is_current(&second, "fp-1"));
    }

    #[test]
    fn score_accepts_legacy_field_names() {
        let parsed: AdvisoryScore = serde_json::from_str(
            r#"{"id":"a","priorityScore":72,"clinicalInsight":"needs a bed"}"#,
        )
        .unwrap();
        assert_eq!(parsed.score, 72.0);
        assert_eq!(parsed.rationale, "needs a bed");
    }

    #[tokio::test]
    async fn timeout_is_reported_as_unavailable() {
        let err = request_scores(&SlowAdvisory, &[], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CorridorError::CollaboratorUnavailable(_)));

        let stats = CorridorStats::default();
        let text = request_narrative(
            &SlowAdvisory,
            NarrativeRequest::Summary(&stats),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(text, None);

        let handover = NarrativeRequest::Handover {
            corridor: "Corridor 1",
            patients: &[],
        };
        let text = request_narrative(&SlowAdvisory, handover, Duration::from_millis(20)).await;
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn service_errors_are_reported_as_unavailable() {
        let err = request_scores(&BrokenAdvisory, &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CorridorError::CollaboratorUnavailable(msg) if msg.contains("garbled")));

        let err = request_scores(&DisabledAdvisory, &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CorridorError::CollaboratorUnavailable(_)));

        let handover = NarrativeRequest::Handover {
            corridor: "Corridor 1",
            patients: &[],
        };
        assert_eq!(
            request_narrative(&BrokenAdvisory, handover, Duration::from_secs(1)).await,
            None
        );
    }
}
