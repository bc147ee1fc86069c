use crate::evaluations;
use crate::export;
use crate::ipc::error::ok;
use crate::ipc::handlers::setup::{practice_settings, profiles};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_score, get_text, query_failed, require_open_service,
    require_service, require_student, update_failed, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Attendance;
use crate::rubric::RubricKind;
use crate::scoring::{self, ScoringInputs};
use crate::store::Store;
use serde_json::{json, Value};

fn rubric_json(kind: RubricKind) -> Value {
    json!({
        "items": kind.items(),
        "maxTotal": kind.max_total(),
    })
}

fn rubric_get() -> Value {
    json!({
        "group": rubric_json(RubricKind::Group),
        "individual": rubric_json(RubricKind::Individual),
    })
}

fn validated_score(kind: RubricKind, params: &Value) -> Result<(String, f64), HandlerErr> {
    let item_id = get_required_str(params, "itemId")?;
    let Some(item) = kind.find(&item_id) else {
        return Err(HandlerErr::bad_params("unknown rubric item").with_details(json!({ "itemId": item_id })));
    };
    let score = get_score(params, "score")?;
    if score < 0.0 || score > item.points {
        return Err(HandlerErr::bad_params(format!(
            "score for {} must be in 0..={}",
            item.id, item.points
        )));
    }
    Ok((item_id, score))
}

fn evaluations_form(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let service = require_service(store, &service_id)?;
    let students = store.students().map_err(query_failed)?;
    let groups = store.practice_groups().map_err(query_failed)?;
    let state = store.evaluations().map_err(query_failed)?;
    let form = evaluations::evaluation_form(&service, &students, &groups, &state);
    Ok(json!(form))
}

fn require_assigned_group(service: &crate::model::Service, group_id: &str) -> Result<(), HandlerErr> {
    if service.group_assignments.assigned_groups().iter().any(|g| g == group_id) {
        return Ok(());
    }
    Err(HandlerErr::bad_params("group is not assigned to this service")
        .with_details(json!({ "serviceId": service.id, "groupId": group_id })))
}

fn set_group_score(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let group_id = get_required_str(params, "groupId")?;
    let service = require_open_service(store, &service_id)?;
    require_assigned_group(&service, &group_id)?;
    let (item_id, score) = validated_score(RubricKind::Group, params)?;

    let mut state = store.evaluations().map_err(query_failed)?;
    evaluations::set_group_score(&mut state, &service_id, &group_id, &item_id, score);
    store.set_evaluations(&state).map_err(update_failed)?;
    Ok(json!({ "ok": true, "score": score }))
}

fn set_group_observation(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let group_id = get_required_str(params, "groupId")?;
    let observation = get_text(params, "observation")?;
    let service = require_open_service(store, &service_id)?;
    require_assigned_group(&service, &group_id)?;

    let mut state = store.evaluations().map_err(query_failed)?;
    evaluations::set_group_observation(&mut state, &service_id, &group_id, &observation);
    store.set_evaluations(&state).map_err(update_failed)?;
    Ok(json!({ "ok": true }))
}

fn set_attendance(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let nre = get_required_str(params, "nre")?;
    let raw = get_required_str(params, "attendance")?;
    let attendance = Attendance::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("attendance must be present or absent"))?;
    require_open_service(store, &service_id)?;
    require_student(store, &nre)?;

    let mut state = store.evaluations().map_err(query_failed)?;
    evaluations::set_attendance(&mut state, &service_id, &nre, attendance);
    store.set_evaluations(&state).map_err(update_failed)?;
    Ok(json!({ "ok": true, "attendance": attendance }))
}

fn set_individual_score(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let nre = get_required_str(params, "nre")?;
    require_open_service(store, &service_id)?;
    require_student(store, &nre)?;
    let (item_id, score) = validated_score(RubricKind::Individual, params)?;

    let mut state = store.evaluations().map_err(query_failed)?;
    evaluations::set_individual_score(&mut state, &service_id, &nre, &item_id, score);
    store.set_evaluations(&state).map_err(update_failed)?;
    Ok(json!({ "ok": true, "score": score }))
}

fn set_individual_observation(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let nre = get_required_str(params, "nre")?;
    let observation = get_text(params, "observation")?;
    require_open_service(store, &service_id)?;
    require_student(store, &nre)?;

    let mut state = store.evaluations().map_err(query_failed)?;
    evaluations::set_individual_observation(&mut state, &service_id, &nre, &observation);
    store.set_evaluations(&state).map_err(update_failed)?;
    Ok(json!({ "ok": true }))
}

fn student_scores(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let student = require_student(store, &nre)?;
    let mut services = store.services().map_err(query_failed)?;
    scoring::sort_services_by_date(&mut services);
    let state = store.evaluations().map_err(query_failed)?;
    let groups = store.practice_groups().map_err(query_failed)?;
    let inputs = ScoringInputs {
        evaluations: &state,
        practice_groups: &groups,
    };
    let sheet = scoring::student_score_sheet(inputs, &student, services.iter());
    Ok(json!({
        "student": { "nre": student.nre, "displayName": student.display_name() },
        "practiceGroup": groups.get(&nre),
        "services": services,
        "sheet": sheet,
    }))
}

fn load_summary(store: &Store<'_>) -> Result<scoring::SummaryModel, HandlerErr> {
    let students = store.students().map_err(query_failed)?;
    let services = store.services().map_err(query_failed)?;
    let state = store.evaluations().map_err(query_failed)?;
    let groups = store.practice_groups().map_err(query_failed)?;
    Ok(scoring::summary_model(
        ScoringInputs {
            evaluations: &state,
            practice_groups: &groups,
        },
        &students,
        &services,
    ))
}

fn summary(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!(load_summary(store)?))
}

/// Returns the CSV text, or writes it to `outPath` when one is given.
fn export_csv(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let table = export::spreadsheet_table(&load_summary(store)?);
    let csv = export::to_csv(&table);
    let row_count = table.rows.len();
    match get_optional_str(params, "outPath") {
        Some(out_path) => {
            std::fs::write(&out_path, csv.as_bytes()).map_err(|e| {
                HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path }))
            })?;
            tracing::info!(path = %out_path, rows = row_count, "evaluation summary exported");
            Ok(json!({ "ok": true, "path": out_path, "rowCount": row_count }))
        }
        None => Ok(json!({ "csv": csv, "headers": table.headers, "rowCount": row_count })),
    }
}

fn print_model(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let rows_per_page = match params.get("rowsPerPage").filter(|v| !v.is_null()) {
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HandlerErr::bad_params("rowsPerPage must be a non-negative integer"))?,
        None => practice_settings(store.conn()).map_err(query_failed)?.print_rows_per_page,
    };
    let (teacher, institute) = profiles(store.conn()).map_err(query_failed)?;
    let table = export::print_table(&load_summary(store)?, rows_per_page);
    Ok(json!({
        "title": "Resumen de Evaluaciones de Servicios",
        "generatedAt": chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
        "teacher": teacher,
        "institute": institute,
        "table": table,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    // Static data; no workspace needed.
    if req.method == "rubric.get" {
        return Some(ok(&req.id, rubric_get()));
    }
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "evaluations.form" => evaluations_form,
        "evaluations.setGroupScore" => set_group_score,
        "evaluations.setGroupObservation" => set_group_observation,
        "evaluations.setAttendance" => set_attendance,
        "evaluations.setIndividualScore" => set_individual_score,
        "evaluations.setIndividualObservation" => set_individual_observation,
        "evaluations.studentScores" => student_scores,
        "evaluations.summary" => summary,
        "evaluations.exportCsv" => export_csv,
        "evaluations.printModel" => print_model,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
