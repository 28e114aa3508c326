//! Read-side projections over the patient set: list/search views, corridor statistics
//! and the watch lists (stale venous access, recent admissions).
//!
//! Nothing here mutates a record. Finalized records only ever show up in
//! [`View::History`].

use crate::model::{Patient, Pendency, Situation, Status};
use crate::venous_access;
use crate::CorridorError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    /// Everyone still in the corridor.
    #[default]
    Active,
    /// Finalized transfers and discharges.
    History,
    /// Transfer requested, waiting to be finalized.
    TransferQueue,
    /// Active with no transfer requested yet.
    TransferEligible,
}

impl View {
    pub fn includes(&self, patient: &Patient) -> bool {
        match self {
            View::Active => patient.is_active(),
            View::History => patient.is_finalized(),
            View::TransferQueue => patient.is_transfer_requested(),
            View::TransferEligible => patient.is_active() && !patient.is_transfer_requested(),
        }
    }
}

impl FromStr for View {
    type Err = CorridorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "active" => Ok(View::Active),
            "history" => Ok(View::History),
            "transferqueue" => Ok(View::TransferQueue),
            "transfereligible" => Ok(View::TransferEligible),
            _ => Err(CorridorError::Validation(format!("unknown view: {s}"))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub view: View,
    /// Case-insensitive match on the name, substring match on the medical record.
    pub search: String,
    /// Exact specialty. Blank means any.
    pub specialty: Option<String>,
}

impl ListQuery {
    fn matches(&self, patient: &Patient) -> bool {
        if !self.view.includes(patient) {
            return false;
        }

        if let Some(specialty) = self.specialty.as_deref().map(str::trim) {
            if !specialty.is_empty() && patient.specialty != specialty {
                return false;
            }
        }

        let term = self.search.trim();
        if term.is_empty() {
            return true;
        }
        patient.name.to_lowercase().contains(&term.to_lowercase())
            || patient.medical_record.contains(term)
    }
}

/// Filters and sorts by name.
pub fn project<'a>(patients: &'a [Patient], query: &ListQuery) -> Vec<&'a Patient> {
    let mut rows: Vec<&Patient> = patients.iter().filter(|p| query.matches(p)).collect();
    rows.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialtyCount {
    pub specialty: String,
    pub count: usize,
}

/// Corridor totals over the active subset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorStats {
    pub active: usize,
    pub admitted: usize,
    pub observation: usize,
    pub reassessment: usize,
    pub discharged: usize,
    pub transfer_requested: usize,
    /// Any pendency or missing safety identification.
    pub with_pendency: usize,
    pub stretchers: usize,
    pub chairs: usize,
    /// Waiting on a prescription or a lab exam.
    pub bottlenecks: usize,
    /// Most common first.
    pub specialties: Vec<SpecialtyCount>,
}

pub fn corridor_stats(patients: &[Patient]) -> CorridorStats {
    let mut stats = CorridorStats::default();
    let mut specialties: BTreeMap<&str, usize> = BTreeMap::new();

    for p in patients.iter().filter(|p| p.is_active()) {
        stats.active += 1;
        match p.status {
            Status::Admitted => stats.admitted += 1,
            Status::Observation => stats.observation += 1,
            Status::Reassessment => stats.reassessment += 1,
            Status::Discharged => stats.discharged += 1,
            _ => {}
        }
        if p.is_transfer_requested() {
            stats.transfer_requested += 1;
        }
        if p.has_open_pendency() {
            stats.with_pendency += 1;
        }
        match p.situation {
            Situation::Stretcher => stats.stretchers += 1,
            Situation::Chair => stats.chairs += 1,
        }
        if matches!(
            p.pendency,
            Pendency::NoMedicalPrescription | Pendency::AwaitingLabExam
        ) {
            stats.bottlenecks += 1;
        }
        let specialty = p.specialty.trim();
        if !specialty.is_empty() {
            *specialties.entry(specialty).or_default() += 1;
        }
    }

    let mut specialties: Vec<SpecialtyCount> = specialties
        .into_iter()
        .map(|(specialty, count)| SpecialtyCount {
            specialty: specialty.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the alphabetical order among ties.
    specialties.sort_by(|a, b| b.count.cmp(&a.count));
    stats.specialties = specialties;
    stats
}

/// Active records whose venous access is older than `limit`.
pub fn stale_venous_access(
    patients: &[Patient],
    now: NaiveDateTime,
    limit: chrono::Duration,
) -> Vec<&Patient> {
    patients
        .iter()
        .filter(|p| p.is_active())
        .filter(|p| venous_access::is_stale_with_limit(&p.venous_access, now, limit))
        .collect()
}

pub fn recent_admissions(
    patients: &[Patient],
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Vec<&Patient> {
    patients.iter().filter(|p| p.is_recent(now, ttl)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{at, patient};
    use crate::model::TransferPhase;

    fn corridor() -> Vec<Patient> {
        let mut bruno = patient("b", "bruno lima");
        bruno.medical_record = "553311".into();
        bruno.specialty = "Orthopedics".into();
        bruno.situation = Situation::Chair;

        let mut carla = patient("c", "Carla Dias");
        carla.transfer.phase = TransferPhase::Requested;
        carla.pendency = Pendency::AwaitingLabExam;

        let mut davi = patient("d", "Davi Rocha");
        davi.transfer.phase = TransferPhase::Finalized {
            at: at(2024, 1, 11, 9, 0),
        };

        vec![carla, davi, bruno, patient("a", "Ana Souza")]
    }

    fn names(rows: Vec<&Patient>) -> Vec<&str> {
        rows.into_iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn transferred_records_are_absent_from_active_views() {
        let all = corridor();
        for view in [View::Active, View::TransferQueue, View::TransferEligible] {
            let query = ListQuery {
                view,
                ..Default::default()
            };
            assert!(project(&all, &query).iter().all(|p| p.is_active()));
        }
        let history = ListQuery {
            view: View::History,
            ..Default::default()
        };
        assert_eq!(names(project(&all, &history)), vec!["Davi Rocha"]);
    }

    #[test]
    fn active_view_sorts_by_name_case_insensitively() {
        let all = corridor();
        assert_eq!(
            names(project(&all, &ListQuery::default())),
            vec!["Ana Souza", "bruno lima", "Carla Dias"]
        );
    }

    #[test]
    fn search_matches_name_or_medical_record() {
        let all = corridor();
        let by_name = ListQuery {
            search: "  SOUZA ".into(),
            ..Default::default()
        };
        assert_eq!(names(project(&all, &by_name)), vec!["Ana Souza"]);

        let by_record = ListQuery {
            search: "5533".into(),
            ..Default::default()
        };
        assert_eq!(names(project(&all, &by_record)), vec!["bruno lima"]);
    }

    #[test]
    fn specialty_filter_is_exact() {
        let all = corridor();
        let query = ListQuery {
            specialty: Some("Orthopedics".into()),
            ..Default::default()
        };
        assert_eq!(names(project(&all, &query)), vec!["bruno lima"]);

        let blank = ListQuery {
            specialty: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(project(&all, &blank).len(), 3);
    }

    #[test]
    fn transfer_views_split_on_request() {
        let all = corridor();
        let queue = ListQuery {
            view: View::TransferQueue,
            ..Default::default()
        };
        assert_eq!(names(project(&all, &queue)), vec!["Carla Dias"]);

        let eligible = ListQuery {
            view: "transfer-eligible".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(
            names(project(&all, &eligible)),
            vec!["Ana Souza", "bruno lima"]
        );
    }

    #[test]
    fn stats_cover_active_records_only() {
        let stats = corridor_stats(&corridor());
        assert_eq!(stats.active, 3);
        assert_eq!(stats.admitted, 3);
        assert_eq!(stats.transfer_requested, 1);
        assert_eq!(stats.with_pendency, 1);
        assert_eq!(stats.bottlenecks, 1);
        assert_eq!(stats.chairs, 1);
        assert_eq!(stats.stretchers, 2);
        assert_eq!(
            stats.specialties,
            vec![
                SpecialtyCount {
                    specialty: "General Surgery".into(),
                    count: 2
                },
                SpecialtyCount {
                    specialty: "Orthopedics".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn stale_access_list_skips_finalized_and_undated() {
        let mut all = corridor();
        for p in &mut all {
            p.venous_access = "MSD 01/01".into();
        }
        all[2].venous_access = "MSE".into();

        let now = at(2024, 1, 10, 12, 0).naive_utc();
        let stale = stale_venous_access(&all, now, chrono::Duration::hours(96));
        let mut ids: Vec<_> = stale.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn recent_admissions_respect_ttl() {
        let all = corridor();
        let ttl = chrono::Duration::seconds(90);
        assert_eq!(recent_admissions(&all, at(2024, 1, 10, 8, 1), ttl).len(), 3);
        assert!(recent_admissions(&all, at(2024, 1, 10, 9, 0), ttl).is_empty());
    }
}
