use crate::dashboard::dashboard_summary;
use crate::ipc::handlers::setup::practice_settings;
use crate::ipc::helpers::{get_optional_str, parse_date, query_failed, today, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::{json, Value};

fn summary(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let as_of = match get_optional_str(params, "today") {
        Some(d) => parse_date(&d, "today")?,
        None => today(),
    };
    let settings = practice_settings(store.conn()).map_err(query_failed)?;
    let students = store.students().map_err(query_failed)?;
    let services = store.services().map_err(query_failed)?;
    let summary = dashboard_summary(
        &students,
        &services,
        as_of,
        settings.upcoming_services_limit,
        settings.recent_annotations_limit,
    );
    Ok(json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(with_store(state, req, summary)),
        _ => None,
    }
}
