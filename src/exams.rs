//! Practical exam marking.

use crate::model::{ExamType, PracticalExamScore, StudentPracticalExam};
use crate::rubric::{exam_rubric, ResultArea};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaResult {
    pub area_id: String,
    pub weight: f64,
    pub mean: f64,
    pub weighted: f64,
}

/// Each result area contributes weight × the mean of its criteria scores.
/// Criteria without a score count as 0.
pub fn area_results(rubric: &[ResultArea], scores: &[PracticalExamScore]) -> Vec<AreaResult> {
    rubric
        .iter()
        .map(|area| {
            let sum: f64 = area
                .criteria
                .iter()
                .map(|c| {
                    scores
                        .iter()
                        .find(|s| s.criterion_id == c.id)
                        .map(|s| s.score)
                        .unwrap_or(0.0)
                })
                .sum();
            let mean = if area.criteria.is_empty() {
                0.0
            } else {
                sum / area.criteria.len() as f64
            };
            AreaResult {
                area_id: area.id.to_string(),
                weight: area.weight,
                mean,
                weighted: mean * area.weight,
            }
        })
        .collect()
}

pub fn final_score(exam_type: ExamType, scores: &[PracticalExamScore]) -> f64 {
    area_results(exam_rubric(exam_type), scores)
        .iter()
        .map(|a| a.weighted)
        .sum()
}

pub fn criterion_exists(exam_type: ExamType, criterion_id: &str) -> bool {
    exam_rubric(exam_type)
        .iter()
        .flat_map(|a| a.criteria.iter())
        .any(|c| c.id == criterion_id)
}

/// Replaces the exam for (student, type) or appends it, recomputing the final score.
pub fn upsert_exam(exams: &mut Vec<StudentPracticalExam>, mut exam: StudentPracticalExam) -> f64 {
    let score = final_score(exam.exam_type, &exam.scores);
    exam.final_score = Some(score);
    match exams
        .iter_mut()
        .find(|e| e.student_nre == exam.student_nre && e.exam_type == exam.exam_type)
    {
        Some(existing) => *existing = exam,
        None => exams.push(exam),
    }
    score
}

pub fn find_exam<'a>(
    exams: &'a [StudentPracticalExam],
    nre: &str,
    exam_type: ExamType,
) -> Option<&'a StudentPracticalExam> {
    exams
        .iter()
        .find(|e| e.student_nre == nre && e.exam_type == exam_type)
}
