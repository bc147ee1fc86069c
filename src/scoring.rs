//! Service score aggregation.
//!
//! A student's result for one service is the sum of their individual rubric
//! scores plus the sum of their practice group's rubric scores. Services the
//! student did not attend (or was never marked for) are not counted, and the
//! final average is taken over the counted services only.

use crate::model::{
    Attendance, EvaluationItemScore, EvaluationsState, Service, Student, StudentGroupAssignments,
};
use serde::Serialize;
use std::collections::BTreeMap;

pub const NO_ACADEMIC_GROUP: &str = "Sin Grupo";

/// Per-service breakdown. Both components are `None` when the service is
/// not counted for the student, which is different from a zero score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceScores {
    pub group: Option<f64>,
    pub individual: Option<f64>,
}

impl ServiceScores {
    pub const NOT_COUNTED: ServiceScores = ServiceScores {
        group: None,
        individual: None,
    };

    pub fn total(&self) -> Option<f64> {
        match (self.group, self.individual) {
            (Some(g), Some(i)) => Some(g + i),
            _ => None,
        }
    }
}

/// Read-only inputs the aggregation needs beyond the student and services.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    pub evaluations: &'a EvaluationsState,
    pub practice_groups: &'a StudentGroupAssignments,
}

pub fn compute_score_for_items(scores: &[EvaluationItemScore]) -> f64 {
    scores.iter().map(|s| s.score).sum()
}

pub fn compute_service_scores(
    inputs: ScoringInputs<'_>,
    student: &Student,
    service: &Service,
) -> ServiceScores {
    let Some(individual) = inputs.evaluations.find_individual(&service.id, &student.nre) else {
        return ServiceScores::NOT_COUNTED;
    };
    if individual.attendance != Attendance::Present {
        return ServiceScores::NOT_COUNTED;
    }

    let individual_score = compute_score_for_items(&individual.scores);
    // A present student whose group has no evaluation still counts, with 0 for the group part.
    let group_score = inputs
        .practice_groups
        .get(&student.nre)
        .and_then(|group| inputs.evaluations.find_group(&service.id, group))
        .map(|e| compute_score_for_items(&e.scores))
        .unwrap_or(0.0);

    ServiceScores {
        group: Some(group_score),
        individual: Some(individual_score),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentScoreSheet {
    pub nre: String,
    pub service_scores: BTreeMap<String, ServiceScores>,
    pub services_counted: usize,
    pub average: f64,
}

pub fn student_score_sheet<'s, I>(
    inputs: ScoringInputs<'_>,
    student: &Student,
    services: I,
) -> StudentScoreSheet
where
    I: IntoIterator<Item = &'s Service>,
{
    let mut service_scores = BTreeMap::new();
    let mut total = 0.0;
    let mut counted: usize = 0;

    for service in services {
        let scores = compute_service_scores(inputs, student, service);
        if let Some(t) = scores.total() {
            total += t;
            counted += 1;
        }
        service_scores.insert(service.id.clone(), scores);
    }

    // Averaged over attended services only, not over the whole schedule.
    let average = if counted > 0 {
        total / (counted as f64)
    } else {
        0.0
    };

    StudentScoreSheet {
        nre: student.nre.clone(),
        service_scores,
        services_counted: counted,
        average,
    }
}

/// Mean of `group + individual` over the services the student attended.
pub fn compute_average<'s, I>(inputs: ScoringInputs<'_>, student: &Student, services: I) -> f64
where
    I: IntoIterator<Item = &'s Service>,
{
    student_score_sheet(inputs, student, services).average
}

/// Services ordered by date ascending; undated or unparseable dates go last.
pub fn sort_services_by_date(services: &mut [Service]) {
    services.sort_by(|a, b| {
        let da = chrono::NaiveDate::parse_from_str(&a.date, "%Y-%m-%d").ok();
        let db = chrono::NaiveDate::parse_from_str(&b.date, "%Y-%m-%d").ok();
        match (da, db) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.date.cmp(&b.date),
        }
    });
}

/// Students grouped by academic group: groups by name, students by full name.
pub fn students_by_group(students: &[Student]) -> Vec<(String, Vec<&Student>)> {
    let mut grouped: BTreeMap<String, Vec<&Student>> = BTreeMap::new();
    for s in students {
        let name = if s.group.trim().is_empty() {
            NO_ACADEMIC_GROUP.to_string()
        } else {
            s.group.clone()
        };
        grouped.entry(name).or_default().push(s);
    }
    grouped
        .into_iter()
        .map(|(name, mut list)| {
            list.sort_by_key(|s| s.sort_key());
            (name, list)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryService {
    pub id: String,
    pub name: String,
    pub date: String,
    pub trimester: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStudentRow {
    pub nre: String,
    pub display_name: String,
    pub academic_group: String,
    pub sheet: StudentScoreSheet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryGroup {
    pub name: String,
    pub students: Vec<SummaryStudentRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryModel {
    pub services: Vec<SummaryService>,
    pub groups: Vec<SummaryGroup>,
    pub max_per_service: f64,
}

pub fn summary_model(
    inputs: ScoringInputs<'_>,
    students: &[Student],
    services: &[Service],
) -> SummaryModel {
    let mut ordered = services.to_vec();
    sort_services_by_date(&mut ordered);

    let groups = students_by_group(students)
        .into_iter()
        .map(|(name, list)| SummaryGroup {
            students: list
                .into_iter()
                .map(|s| SummaryStudentRow {
                    nre: s.nre.clone(),
                    display_name: s.display_name(),
                    academic_group: s.group.clone(),
                    sheet: student_score_sheet(inputs, s, ordered.iter()),
                })
                .collect(),
            name,
        })
        .collect();

    SummaryModel {
        services: ordered
            .iter()
            .map(|s| SummaryService {
                id: s.id.clone(),
                name: s.name.clone(),
                date: s.date.clone(),
                trimester: s.trimester,
            })
            .collect(),
        groups,
        max_per_service: crate::rubric::RubricKind::Group.max_total()
            + crate::rubric::RubricKind::Individual.max_total(),
    }
}
