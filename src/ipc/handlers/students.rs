use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_text, parse_date, query_failed, require_service,
    require_student, today, update_failed, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Annotation, AnnotationKind, Interview, Student, EARLY_DEPARTURE_SUBTYPE};
use crate::store::Store;
use serde_json::{json, Value};
use uuid::Uuid;

fn students_list(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let mut students = store.students().map_err(query_failed)?;
    if let Some(group) = get_optional_str(params, "group") {
        students.retain(|s| s.group == group);
    }
    students.sort_by_key(|s| s.sort_key());
    Ok(json!({ "students": students }))
}

fn students_get(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let student = require_student(store, &nre)?;
    let practice_group = store.practice_groups().map_err(query_failed)?.remove(&nre);
    Ok(json!({ "student": student, "practiceGroup": practice_group }))
}

fn parse_student(v: &Value) -> Result<Student, HandlerErr> {
    let mut student: Student = serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid student: {}", e)))?;
    student.nre = student.nre.trim().to_string();
    if student.nre.is_empty() {
        return Err(HandlerErr::bad_params("missing student.nre"));
    }
    Ok(student)
}

fn students_create(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let raw = params
        .get("student")
        .ok_or_else(|| HandlerErr::bad_params("missing student"))?;
    let student = parse_student(raw)?;
    let mut students = store.students().map_err(query_failed)?;
    if students.iter().any(|s| s.nre == student.nre) {
        return Err(HandlerErr::new("conflict", "a student with this nre already exists")
            .with_details(json!({ "nre": student.nre })));
    }
    let nre = student.nre.clone();
    students.push(student);
    store.set_students(&students).map_err(update_failed)?;
    tracing::info!(nre = %nre, "student created");
    Ok(json!({ "nre": nre }))
}

/// Applies a field patch over the stored student. The nre cannot change.
fn students_update(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;
    if let Some(v) = patch.get("nre") {
        if v.as_str().map(str::trim) != Some(nre.as_str()) {
            return Err(HandlerErr::bad_params("nre cannot be changed"));
        }
    }

    let mut students = store.students().map_err(query_failed)?;
    let Some(idx) = students.iter().position(|s| s.nre == nre) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let mut merged = serde_json::to_value(&students[idx])
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if let Some(obj) = merged.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
    let updated = parse_student(&merged)?;
    students[idx] = updated.clone();
    store.set_students(&students).map_err(update_failed)?;
    Ok(json!({ "student": updated }))
}

/// Deleting a student also prunes the rows that referenced them.
fn students_delete(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let mut students = store.students().map_err(query_failed)?;
    let before = students.len();
    students.retain(|s| s.nre != nre);
    if students.len() == before {
        return Err(HandlerErr::not_found("student not found"));
    }
    store.set_students(&students).map_err(update_failed)?;
    let report = store.reconcile().map_err(update_failed)?;
    tracing::info!(nre = %nre, pruned = report.total(), "student deleted");
    Ok(json!({ "ok": true, "pruned": report }))
}

fn with_student_mut<F>(store: &Store<'_>, nre: &str, f: F) -> Result<Value, HandlerErr>
where
    F: FnOnce(&mut Student) -> Result<Value, HandlerErr>,
{
    let mut students = store.students().map_err(query_failed)?;
    let student = students
        .iter_mut()
        .find(|s| s.nre == nre)
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    let out = f(student)?;
    store.set_students(&students).map_err(update_failed)?;
    Ok(out)
}

fn date_or_today(params: &Value) -> Result<String, HandlerErr> {
    match get_optional_str(params, "date") {
        Some(d) => Ok(parse_date(&d, "date")?.format("%Y-%m-%d").to_string()),
        None => Ok(today().format("%Y-%m-%d").to_string()),
    }
}

fn interviews_add(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let interview = Interview {
        id: Uuid::new_v4().to_string(),
        date: date_or_today(params)?,
        attendees: get_text(params, "attendees")?,
        notes: get_text(params, "notes")?,
    };
    with_student_mut(store, &nre, |s| {
        let id = interview.id.clone();
        s.interviews.get_or_insert_with(Vec::new).push(interview);
        Ok(json!({ "interviewId": id }))
    })
}

fn interviews_delete(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let interview_id = get_required_str(params, "interviewId")?;
    with_student_mut(store, &nre, |s| {
        let list = s.interviews.get_or_insert_with(Vec::new);
        let before = list.len();
        list.retain(|i| i.id != interview_id);
        if list.len() == before {
            return Err(HandlerErr::not_found("interview not found"));
        }
        Ok(json!({ "ok": true }))
    })
}

fn annotations_add(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let note = get_required_str(params, "note")?;
    let kind_raw = get_required_str(params, "type")?;
    let kind = AnnotationKind::parse(&kind_raw)
        .ok_or_else(|| HandlerErr::bad_params("type must be one of: positive, negative, neutral"))?;
    let annotation = Annotation {
        id: Uuid::new_v4().to_string(),
        date: date_or_today(params)?,
        note,
        kind,
        subtype: get_optional_str(params, "subtype"),
    };
    with_student_mut(store, &nre, |s| {
        let id = annotation.id.clone();
        s.push_annotation(annotation);
        Ok(json!({ "annotationId": id }))
    })
}

fn annotations_delete(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    let annotation_id = get_required_str(params, "annotationId")?;
    with_student_mut(store, &nre, |s| {
        let list = s.annotations.get_or_insert_with(Vec::new);
        let before = list.len();
        list.retain(|a| a.id != annotation_id);
        if list.len() == before {
            return Err(HandlerErr::not_found("annotation not found"));
        }
        Ok(json!({ "ok": true }))
    })
}

/// Records the same early-departure note on every selected student.
fn departures_record(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nres: Vec<String> = params
        .get("nres")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if nres.is_empty() {
        return Err(HandlerErr::bad_params("select at least one student"));
    }
    let note = get_optional_str(params, "note")
        .ok_or_else(|| HandlerErr::bad_params("enter a note describing the departure"))?;

    let date = if let Some(d) = get_optional_str(params, "date") {
        parse_date(&d, "date")?.format("%Y-%m-%d").to_string()
    } else if let Some(service_id) = get_optional_str(params, "serviceId") {
        require_service(store, &service_id)?.date
    } else {
        today().format("%Y-%m-%d").to_string()
    };

    let mut students = store.students().map_err(query_failed)?;
    let missing: Vec<&String> = nres
        .iter()
        .filter(|n| !students.iter().any(|s| &s.nre == *n))
        .collect();
    if !missing.is_empty() {
        return Err(HandlerErr::not_found("student not found").with_details(json!({ "nres": missing })));
    }

    let mut recorded = Vec::new();
    for s in students.iter_mut().filter(|s| nres.contains(&s.nre)) {
        let annotation = Annotation {
            id: Uuid::new_v4().to_string(),
            date: date.clone(),
            note: note.clone(),
            kind: AnnotationKind::Negative,
            subtype: Some(EARLY_DEPARTURE_SUBTYPE.to_string()),
        };
        recorded.push(json!({ "nre": s.nre, "annotationId": annotation.id }));
        s.push_annotation(annotation);
    }
    store.set_students(&students).map_err(update_failed)?;
    tracing::info!(count = recorded.len(), date = %date, "early departures recorded");
    Ok(json!({ "date": date, "recorded": recorded }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.interviews.add" => interviews_add,
        "students.interviews.delete" => interviews_delete,
        "students.annotations.add" => annotations_add,
        "students.annotations.delete" => annotations_delete,
        "departures.record" => departures_record,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
