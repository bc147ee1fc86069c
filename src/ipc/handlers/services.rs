use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_date, query_failed, require_service, require_student,
    update_failed, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{GroupAssignments, Service};
use crate::scoring::sort_services_by_date;
use crate::store::Store;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

fn parse_trimester(v: &Value) -> Result<u8, HandlerErr> {
    match v.as_u64() {
        Some(n @ 1..=3) => Ok(n as u8),
        _ => Err(HandlerErr::bad_params("trimester must be 1, 2 or 3")),
    }
}

fn parse_group_list(v: Option<&Value>, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(v) = v else {
        return Ok(Vec::new());
    };
    let arr = v
        .as_array()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an array of strings", key)))?;
    let mut out: Vec<String> = Vec::new();
    for item in arr {
        let name = item
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HandlerErr::bad_params(format!("{} entries must be non-empty strings", key)))?;
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

fn parse_group_assignments(v: &Value) -> Result<GroupAssignments, HandlerErr> {
    if !v.is_object() {
        return Err(HandlerErr::bad_params("groupAssignments must be an object"));
    }
    Ok(GroupAssignments {
        dining_room: parse_group_list(v.get("comedor"), "comedor")?,
        takeaway: parse_group_list(v.get("takeaway"), "takeaway")?,
    })
}

fn services_list(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let mut services = store.services().map_err(query_failed)?;
    if let Some(t) = params.get("trimester").filter(|v| !v.is_null()) {
        let t = parse_trimester(t)?;
        services.retain(|s| s.trimester == t);
    }
    sort_services_by_date(&mut services);
    Ok(json!({ "services": services }))
}

fn services_create(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let date = get_required_str(params, "date")?;
    parse_date(&date, "date")?;
    let trimester = parse_trimester(params.get("trimester").unwrap_or(&Value::Null))?;
    let group_assignments = match params.get("groupAssignments") {
        Some(v) if !v.is_null() => parse_group_assignments(v)?,
        _ => GroupAssignments::default(),
    };

    let service = Service {
        id: Uuid::new_v4().to_string(),
        name,
        date,
        trimester,
        group_assignments,
        finalized: Some(false),
    };
    let mut services = store.services().map_err(query_failed)?;
    services.push(service.clone());
    store.set_services(&services).map_err(update_failed)?;
    tracing::info!(service_id = %service.id, "service created");
    Ok(json!({ "service": service }))
}

fn services_update(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut services = store.services().map_err(query_failed)?;
    let Some(service) = services.iter_mut().find(|s| s.id == id) else {
        return Err(HandlerErr::not_found("service not found"));
    };
    if service.is_finalized() {
        return Err(HandlerErr::new("service_finalized", "service is finalized")
            .with_details(json!({ "serviceId": id })));
    }
    for (k, v) in patch {
        match k.as_str() {
            "name" => {
                service.name = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerErr::bad_params("name must be a non-empty string"))?;
            }
            "date" => {
                let d = v
                    .as_str()
                    .ok_or_else(|| HandlerErr::bad_params("date must be string"))?;
                parse_date(d, "date")?;
                service.date = d.to_string();
            }
            "trimester" => service.trimester = parse_trimester(v)?,
            "groupAssignments" => service.group_assignments = parse_group_assignments(v)?,
            _ => return Err(HandlerErr::bad_params(format!("unknown service field: {}", k))),
        }
    }
    let updated = service.clone();
    store.set_services(&services).map_err(update_failed)?;
    Ok(json!({ "service": updated }))
}

fn services_set_finalized(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let finalized = params
        .get("finalized")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("finalized must be boolean"))?;
    let mut services = store.services().map_err(query_failed)?;
    let Some(service) = services.iter_mut().find(|s| s.id == id) else {
        return Err(HandlerErr::not_found("service not found"));
    };
    service.finalized = Some(finalized);
    store.set_services(&services).map_err(update_failed)?;
    tracing::info!(service_id = %id, finalized, "service finalized flag changed");
    Ok(json!({ "ok": true, "finalized": finalized }))
}

fn services_delete(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let service = require_service(store, &id)?;
    if service.is_finalized() {
        return Err(HandlerErr::new("service_finalized", "service is finalized")
            .with_details(json!({ "serviceId": id })));
    }
    let mut services = store.services().map_err(query_failed)?;
    services.retain(|s| s.id != id);
    store.set_services(&services).map_err(update_failed)?;
    let report = store.reconcile().map_err(update_failed)?;
    Ok(json!({ "ok": true, "pruned": report }))
}

fn practice_groups_get(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let assignments = store.practice_groups().map_err(query_failed)?;
    let groups: BTreeSet<&String> = assignments.values().collect();
    Ok(json!({ "assignments": assignments, "groups": groups }))
}

/// A blank or null group removes the student from their practice group.
fn practice_groups_assign(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let nre = get_required_str(params, "nre")?;
    require_student(store, &nre)?;
    let group = get_optional_str(params, "group");
    let mut assignments = store.practice_groups().map_err(query_failed)?;
    let previous = match &group {
        Some(g) => assignments.insert(nre.clone(), g.clone()),
        None => assignments.remove(&nre),
    };
    store.set_practice_groups(&assignments).map_err(update_failed)?;
    Ok(json!({ "nre": nre, "group": group, "previousGroup": previous }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "services.list" => services_list,
        "services.create" => services_create,
        "services.update" => services_update,
        "services.setFinalized" => services_set_finalized,
        "services.delete" => services_delete,
        "practiceGroups.get" => practice_groups_get,
        "practiceGroups.assign" => practice_groups_assign,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
