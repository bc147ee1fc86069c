use crate::academic::{self, AcademicInputs};
use crate::ipc::helpers::{
    get_required_str, parse_grade, query_failed, require_student, update_failed, with_store,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::rubric::find_course_module;
use crate::scoring::ScoringInputs;
use crate::store::Store;
use serde_json::{json, Value};

fn grades_object<'v>(params: &'v Value) -> Result<&'v serde_json::Map<String, Value>, HandlerErr> {
    params
        .get("grades")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("grades must be an object"))
}

/// Partial update of the theory exam marks; `null` clears a mark.
fn set_theory_grades(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    require_student(store, &nre)?;
    let patch = grades_object(params)?;

    let mut all = store.academic_grades().map_err(query_failed)?;
    let mut grades = all.get(&nre).cloned().unwrap_or_default();
    for (k, v) in patch {
        let value = parse_grade(v, k)?;
        if !grades.set(k, value) {
            return Err(HandlerErr::bad_params(format!("unknown theory grade: {}", k)));
        }
    }
    all.insert(nre.clone(), grades.clone());
    store.set_academic_grades(&all).map_err(update_failed)?;
    Ok(json!({ "nre": nre, "grades": grades }))
}

fn student_report(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let student = require_student(store, &nre)?;
    let services = store.services().map_err(query_failed)?;
    let evaluations = store.evaluations().map_err(query_failed)?;
    let groups = store.practice_groups().map_err(query_failed)?;
    let exams = store.practical_exams().map_err(query_failed)?;
    let theory = store.academic_grades().map_err(query_failed)?;

    let inputs = AcademicInputs {
        scoring: ScoringInputs {
            evaluations: &evaluations,
            practice_groups: &groups,
        },
        services: &services,
        exams: &exams,
        theory: theory.get(&nre),
    };
    let report = academic::academic_report(&inputs, &student);
    Ok(json!({
        "student": { "nre": student.nre, "displayName": student.display_name() },
        "report": report,
    }))
}

fn course_get(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    require_student(store, &nre)?;
    let all = store.course_grades().map_err(query_failed)?;
    Ok(json!({ "nre": nre, "modules": academic::course_report(all.get(&nre)) }))
}

fn course_set_grades(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    require_student(store, &nre)?;
    let module_key = get_required_str(params, "moduleKey")?;
    let module = find_course_module(&module_key).ok_or_else(|| {
        HandlerErr::not_found("course module not found").with_details(json!({ "moduleKey": module_key }))
    })?;
    let patch = grades_object(params)?;

    let mut all = store.course_grades().map_err(query_failed)?;
    let mut grades = all
        .get(&nre)
        .and_then(|m| m.get(module.key))
        .cloned()
        .unwrap_or_default();
    for (k, v) in patch {
        let beyond_module = match k.as_str() {
            "t3" => module.trimesters < 3,
            _ => false,
        };
        if beyond_module {
            return Err(HandlerErr::bad_params(format!("{} has no {}", module.key, k)));
        }
        let value = parse_grade(v, k)?;
        if !grades.set(k, value) {
            return Err(HandlerErr::bad_params(format!("unknown course grade: {}", k)));
        }
    }
    all.entry(nre.clone())
        .or_default()
        .insert(module.key.to_string(), grades.clone());
    store.set_course_grades(&all).map_err(update_failed)?;
    Ok(json!({
        "nre": nre,
        "moduleKey": module.key,
        "grades": grades,
        "final": academic::course_module_final(&grades, module.trimesters),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "academic.setTheoryGrades" => set_theory_grades,
        "academic.studentReport" => student_report,
        "course.get" => course_get,
        "course.setGrades" => course_set_grades,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
