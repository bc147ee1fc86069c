use crate::ipc::handlers::setup::practice_settings;
use crate::ipc::helpers::{
    get_required_str, query_failed, require_open_service, require_student, update_failed, with_store,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::roles::{self, RoleCatalog, UNASSIGNED};
use crate::store::Store;
use serde_json::{json, Value};

fn catalog(store: &Store<'_>) -> Result<RoleCatalog, HandlerErr> {
    practice_settings(store.conn())
        .map(|p| p.catalog)
        .map_err(query_failed)
}

fn planning_roles(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let catalog = catalog(store)?;
    Ok(json!({
        "unassigned": UNASSIGNED,
        "leaderRoles": catalog.leader_roles,
        "secondaryRoles": catalog.secondary_roles,
        "roles": catalog.roles(),
    }))
}

fn planning_grid(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let catalog = catalog(store)?;
    let students = store.students().map_err(query_failed)?;
    let services = store.services().map_err(query_failed)?;
    let assignments = store.planning().map_err(query_failed)?;
    let grid = roles::planning_grid(&students, &services, &assignments, &catalog);
    Ok(json!(grid))
}

fn planning_assign_role(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let service_id = get_required_str(params, "serviceId")?;
    let nre = get_required_str(params, "nre")?;
    let role = get_required_str(params, "role")?;

    require_open_service(store, &service_id)?;
    require_student(store, &nre)?;
    let catalog = catalog(store)?;
    if !catalog.accepts(&role) {
        return Err(HandlerErr::bad_params("unknown role").with_details(json!({ "role": role })));
    }

    let mut assignments = store.planning().map_err(query_failed)?;
    let change = roles::assign_role(
        &mut assignments,
        &service_id,
        &nre,
        &role,
        &catalog.leader_roles,
    );
    store.set_planning(&assignments).map_err(update_failed)?;
    if !change.revoked.is_empty() {
        tracing::info!(service_id = %service_id, role = %role, revoked = ?change.revoked, "exclusive role moved");
    }
    Ok(json!({
        "role": roles::current_role(&assignments, &service_id, &nre),
        "previousRole": change.previous_role,
        "revoked": change.revoked,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "planning.roles" => planning_roles,
        "planning.grid" => planning_grid,
        "planning.assignRole" => planning_assign_role,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
