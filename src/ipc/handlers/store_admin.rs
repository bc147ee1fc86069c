use crate::ipc::error::ok;
use crate::ipc::helpers::{query_failed, update_failed, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::{json, Value};

/// Diagnostics live in process state, so no workspace is needed.
fn handle_diagnostics(state: &mut AppState, req: &Request) -> Value {
    let events = state.diagnostics.snapshot();
    if req.params.get("clear").and_then(|v| v.as_bool()).unwrap_or(false) {
        state.diagnostics.clear();
    }
    ok(&req.id, json!({ "events": events }))
}

fn reconcile(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let report = store.reconcile().map_err(update_failed)?;
    Ok(json!({ "removed": report.total(), "report": report }))
}

fn import_browser_dump(store: &Store<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let entries = params
        .get("entries")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("entries must be an object"))?;
    let report = store.import_browser_dump(entries).map_err(update_failed)?;
    tracing::info!(
        imported = report.imported.len(),
        defaulted = report.defaulted.len(),
        skipped = report.skipped.len(),
        rejected = report.rejected.len(),
        "browser dump imported"
    );
    Ok(json!(report))
}

fn export_browser_dump(store: &Store<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let entries = store.export_browser_dump().map_err(query_failed)?;
    Ok(json!({ "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Store<'_>, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "store.diagnostics" => return Some(handle_diagnostics(state, req)),
        "store.reconcile" => reconcile,
        "store.importBrowserDump" => import_browser_dump,
        "store.exportBrowserDump" => export_browser_dump,
        _ => return None,
    };
    Some(with_store(state, req, f))
}
