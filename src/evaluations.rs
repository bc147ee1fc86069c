//! Edits to the evaluation state. Every operation keeps at most one group
//! record per (service, group) and one individual record per
//! (service, student).

use crate::model::{
    Attendance, EvaluationItemScore, EvaluationsState, GroupEvaluation, IndividualEvaluation,
    Service, Student, StudentGroupAssignments,
};
use serde::Serialize;

/// NaN from a bad numeric input is stored as 0.
pub fn sanitize_score(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn upsert_item(scores: &mut Vec<EvaluationItemScore>, item_id: &str, score: f64) {
    let score = sanitize_score(score);
    match scores.iter_mut().find(|s| s.item_id == item_id) {
        Some(existing) => existing.score = score,
        None => scores.push(EvaluationItemScore {
            item_id: item_id.to_string(),
            score,
        }),
    }
}

fn group_entry<'a>(
    state: &'a mut EvaluationsState,
    service_id: &str,
    group_id: &str,
) -> &'a mut GroupEvaluation {
    let idx = match state
        .group
        .iter()
        .position(|e| e.service_id == service_id && e.group_id == group_id)
    {
        Some(i) => i,
        None => {
            state.group.push(GroupEvaluation {
                service_id: service_id.to_string(),
                group_id: group_id.to_string(),
                scores: Vec::new(),
                observation: String::new(),
            });
            state.group.len() - 1
        }
    };
    &mut state.group[idx]
}

fn individual_entry<'a>(
    state: &'a mut EvaluationsState,
    service_id: &str,
    nre: &str,
    attendance_if_new: Attendance,
) -> &'a mut IndividualEvaluation {
    let idx = match state
        .individual
        .iter()
        .position(|e| e.service_id == service_id && e.student_nre == nre)
    {
        Some(i) => i,
        None => {
            state.individual.push(IndividualEvaluation {
                service_id: service_id.to_string(),
                student_nre: nre.to_string(),
                attendance: attendance_if_new,
                scores: Vec::new(),
                observation: Some(String::new()),
            });
            state.individual.len() - 1
        }
    };
    &mut state.individual[idx]
}

pub fn set_group_score(
    state: &mut EvaluationsState,
    service_id: &str,
    group_id: &str,
    item_id: &str,
    score: f64,
) {
    let e = group_entry(state, service_id, group_id);
    upsert_item(&mut e.scores, item_id, score);
}

pub fn set_group_observation(state: &mut EvaluationsState, service_id: &str, group_id: &str, observation: &str) {
    group_entry(state, service_id, group_id).observation = observation.to_string();
}

pub fn set_attendance(state: &mut EvaluationsState, service_id: &str, nre: &str, attendance: Attendance) {
    individual_entry(state, service_id, nre, attendance).attendance = attendance;
}

/// Scoring a student with no record marks them present.
pub fn set_individual_score(
    state: &mut EvaluationsState,
    service_id: &str,
    nre: &str,
    item_id: &str,
    score: f64,
) {
    let e = individual_entry(state, service_id, nre, Attendance::Present);
    upsert_item(&mut e.scores, item_id, score);
}

pub fn set_individual_observation(state: &mut EvaluationsState, service_id: &str, nre: &str, observation: &str) {
    individual_entry(state, service_id, nre, Attendance::Present).observation = Some(observation.to_string());
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStudent {
    pub nre: String,
    pub display_name: String,
    /// No record yet reads as present.
    pub present: bool,
    pub evaluation: Option<IndividualEvaluation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormGroup {
    pub group_id: String,
    pub evaluation: Option<GroupEvaluation>,
    pub students: Vec<FormStudent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationForm {
    pub service_id: String,
    pub service_name: String,
    pub date: String,
    pub finalized: bool,
    pub groups: Vec<FormGroup>,
}

pub fn evaluation_form(
    service: &Service,
    students: &[Student],
    practice_groups: &StudentGroupAssignments,
    state: &EvaluationsState,
) -> EvaluationForm {
    let groups = service
        .group_assignments
        .assigned_groups()
        .into_iter()
        .map(|group_id| {
            let mut members: Vec<&Student> = students
                .iter()
                .filter(|s| practice_groups.get(&s.nre).map(|g| g == &group_id).unwrap_or(false))
                .collect();
            members.sort_by_key(|s| s.sort_key());
            FormGroup {
                evaluation: state.find_group(&service.id, &group_id).cloned(),
                students: members
                    .into_iter()
                    .map(|s| {
                        let evaluation = state.find_individual(&service.id, &s.nre).cloned();
                        FormStudent {
                            nre: s.nre.clone(),
                            display_name: s.display_name(),
                            present: evaluation
                                .as_ref()
                                .map(|e| e.attendance != Attendance::Absent)
                                .unwrap_or(true),
                            evaluation,
                        }
                    })
                    .collect(),
                group_id,
            }
        })
        .collect();

    EvaluationForm {
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        date: service.date.clone(),
        finalized: service.is_finalized(),
        groups,
    }
}
