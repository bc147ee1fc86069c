use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

/// Each handler module claims the methods it knows; the first match answers.
const HANDLERS: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::students::try_handle,
    handlers::services::try_handle,
    handlers::planning::try_handle,
    handlers::evaluations::try_handle,
    handlers::exams::try_handle,
    handlers::academic::try_handle,
    handlers::dashboard::try_handle,
    handlers::store_admin::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    for try_handle in HANDLERS {
        if let Some(resp) = try_handle(state, &req) {
            if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
                tracing::debug!(id = %req.id, method = %req.method, error = %resp["error"]["code"], "request failed");
            }
            return resp;
        }
    }

    tracing::warn!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
