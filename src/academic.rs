//! Trimester and course grades built from theory exams, service averages and
//! practical exams.

use crate::exams;
use crate::model::{
    CourseModuleGrades, ExamType, Service, Student, StudentPracticalExam, TheoreticalExamGrades,
};
use crate::rubric::{EvaluationPeriod, Instrument, InstrumentKind, COURSE_MODULES, RECOVERY, TRIMESTERS};
use crate::scoring::{compute_average, compute_service_scores, ScoringInputs};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentValue {
    pub key: String,
    pub name: String,
    pub kind: InstrumentKind,
    pub weight: f64,
    /// 0-10 scale; `None` when nothing has been recorded yet.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub name: String,
    pub instruments: Vec<InstrumentValue>,
    pub grade: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicReport {
    pub nre: String,
    pub trimesters: Vec<PeriodReport>,
    pub ordinary: f64,
    pub recovery: Option<PeriodReport>,
    #[serde(rename = "final")]
    pub final_grade: f64,
}

pub struct AcademicInputs<'a> {
    pub scoring: ScoringInputs<'a>,
    pub services: &'a [Service],
    pub exams: &'a [StudentPracticalExam],
    pub theory: Option<&'a TheoreticalExamGrades>,
}

/// Service average for one trimester on a 0-10 scale. Each service is out of
/// 20 (10 group + 10 individual).
pub fn services_grade(inputs: ScoringInputs<'_>, student: &Student, services: &[Service], trimester: u8) -> Option<f64> {
    let term: Vec<&Service> = services.iter().filter(|s| s.trimester == trimester).collect();
    let attended_any = term
        .iter()
        .any(|s| compute_service_scores(inputs, student, s).total().is_some());
    if !attended_any {
        return None;
    }
    Some(compute_average(inputs, student, term) / 2.0)
}

fn instrument_value(inputs: &AcademicInputs<'_>, student: &Student, instrument: &Instrument) -> Option<f64> {
    match instrument.key {
        "servicios1" => services_grade(inputs.scoring, student, inputs.services, 1),
        "servicios2" => services_grade(inputs.scoring, student, inputs.services, 2),
        "exPractico1" => exam_grade(inputs.exams, &student.nre, ExamType::T1),
        "exPractico2" => exam_grade(inputs.exams, &student.nre, ExamType::T2),
        "exPracticoRec" => exam_grade(inputs.exams, &student.nre, ExamType::Rec),
        key => inputs.theory.and_then(|t| t.get(key)),
    }
}

fn exam_grade(exams: &[StudentPracticalExam], nre: &str, exam_type: ExamType) -> Option<f64> {
    exams::find_exam(exams, nre, exam_type)
        .map(|e| e.final_score.unwrap_or_else(|| exams::final_score(e.exam_type, &e.scores)))
}

fn period_report(inputs: &AcademicInputs<'_>, student: &Student, period: &EvaluationPeriod) -> PeriodReport {
    let instruments: Vec<InstrumentValue> = period
        .instruments
        .iter()
        .map(|i| InstrumentValue {
            key: i.key.to_string(),
            name: i.name.to_string(),
            kind: i.kind,
            weight: i.weight,
            value: instrument_value(inputs, student, i),
        })
        .collect();
    let weight_sum: f64 = instruments.iter().map(|i| i.weight).sum();
    let weighted: f64 = instruments
        .iter()
        .map(|i| i.weight * i.value.unwrap_or(0.0))
        .sum();
    PeriodReport {
        name: period.name.to_string(),
        grade: if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 },
        instruments,
    }
}

pub fn academic_report(inputs: &AcademicInputs<'_>, student: &Student) -> AcademicReport {
    let trimesters: Vec<PeriodReport> = TRIMESTERS
        .iter()
        .map(|p| period_report(inputs, student, p))
        .collect();
    let ordinary = if trimesters.is_empty() {
        0.0
    } else {
        trimesters.iter().map(|t| t.grade).sum::<f64>() / trimesters.len() as f64
    };

    let recovery = period_report(inputs, student, &RECOVERY);
    let recovery = if recovery.instruments.iter().any(|i| i.value.is_some()) {
        Some(recovery)
    } else {
        None
    };
    let final_grade = match &recovery {
        Some(r) => ordinary.max(r.grade),
        None => ordinary,
    };

    AcademicReport {
        nre: student.nre.clone(),
        trimesters,
        ordinary,
        recovery,
        final_grade,
    }
}

/// A module's final grade: the recovery mark when present, otherwise the mean
/// of its trimester marks once all of them are in.
pub fn course_module_final(grades: &CourseModuleGrades, trimesters: usize) -> Option<f64> {
    if let Some(rec) = grades.rec {
        return Some(rec);
    }
    let mut sum = 0.0;
    for n in 1..=trimesters {
        sum += grades.trimester(n)?;
    }
    if trimesters == 0 {
        return None;
    }
    Some(sum / trimesters as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModuleReport {
    pub key: String,
    pub name: String,
    pub trimesters: usize,
    pub grades: CourseModuleGrades,
    #[serde(rename = "final")]
    pub final_grade: Option<f64>,
}

pub fn course_report(grades: Option<&BTreeMap<String, CourseModuleGrades>>) -> Vec<CourseModuleReport> {
    COURSE_MODULES
        .iter()
        .map(|m| {
            let g = grades
                .and_then(|all| all.get(m.key))
                .cloned()
                .unwrap_or_default();
            CourseModuleReport {
                key: m.key.to_string(),
                name: m.name.to_string(),
                trimesters: m.trimesters,
                final_grade: course_module_final(&g, m.trimesters),
                grades: g,
            }
        })
        .collect()
}
