use crate::exams;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, query_failed, require_student, update_failed, with_store,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ExamType, StudentPracticalExam};
use crate::rubric::{exam_rubric, is_score_level, SCORE_LEVELS};
use crate::store::Store;
use serde_json::{json, Value};

fn parse_exam_type(params: &Value) -> Result<ExamType, HandlerErr> {
    let raw = get_required_str(params, "examType")?;
    ExamType::parse(&raw).ok_or_else(|| HandlerErr::bad_params("examType must be T1, T2 or REC"))
}

fn exams_rubric(params: &Value) -> Result<Value, HandlerErr> {
    let exam_type = parse_exam_type(params)?;
    Ok(json!({
        "examType": exam_type,
        "areas": exam_rubric(exam_type),
        "scoreLevels": SCORE_LEVELS,
    }))
}

fn exams_list(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let mut exams = store.practical_exams().map_err(query_failed)?;
    if let Some(nre) = get_optional_str(params, "nre") {
        exams.retain(|e| e.student_nre == nre);
    }
    if params.get("examType").map(|v| !v.is_null()).unwrap_or(false) {
        let t = parse_exam_type(params)?;
        exams.retain(|e| e.exam_type == t);
    }
    Ok(json!({ "exams": exams }))
}

fn exams_upsert(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let raw = params
        .get("exam")
        .ok_or_else(|| HandlerErr::bad_params("missing exam"))?;
    let exam: StudentPracticalExam = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid exam: {}", e)))?;
    require_student(store, &exam.student_nre)?;

    for s in &exam.scores {
        if !exams::criterion_exists(exam.exam_type, &s.criterion_id) {
            return Err(HandlerErr::bad_params("unknown criterion")
                .with_details(json!({ "criterionId": s.criterion_id, "examType": exam.exam_type })));
        }
        if !is_score_level(s.score) {
            return Err(HandlerErr::bad_params("score must be one of 10, 8, 5, 2")
                .with_details(json!({ "criterionId": s.criterion_id, "score": s.score })));
        }
    }

    let areas = exams::area_results(exam_rubric(exam.exam_type), &exam.scores);
    let (nre, exam_type) = (exam.student_nre.clone(), exam.exam_type);
    let mut all = store.practical_exams().map_err(query_failed)?;
    let final_score = exams::upsert_exam(&mut all, exam);
    store.set_practical_exams(&all).map_err(update_failed)?;
    tracing::info!(nre = %nre, exam_type = exam_type.as_str(), final_score, "practical exam saved");
    Ok(json!({ "finalScore": final_score, "areas": areas }))
}

fn exams_delete(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let exam_type = parse_exam_type(params)?;
    let mut all = store.practical_exams().map_err(query_failed)?;
    let before = all.len();
    all.retain(|e| !(e.student_nre == nre && e.exam_type == exam_type));
    if all.len() == before {
        return Err(HandlerErr::not_found("exam not found"));
    }
    store.set_practical_exams(&all).map_err(update_failed)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if req.method == "exams.rubric" {
        return Some(match exams_rubric(&req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        });
    }
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "exams.list" => exams_list,
        "exams.upsert" => exams_upsert,
        "exams.delete" => exams_delete,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
