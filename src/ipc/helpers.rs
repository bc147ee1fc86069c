use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Service, Student};
use crate::store::Store;
use serde_json::Value;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn query_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", format!("{:#}", e))
}

pub fn update_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_update_failed", format!("{:#}", e))
}

/// Runs `f` against the open workspace store, turning its result into a reply.
pub fn with_store<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Store<'_>, &Value) -> Result<Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store = Store::new(conn, &state.diagnostics);
    match f(&store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Free text that may legitimately be empty (observations, notes).
pub fn get_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be string", key))),
    }
}

/// Score inputs: numbers pass through, numeric strings are parsed and
/// anything else reads as 0.
pub fn get_score(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(crate::evaluations::sanitize_score(n))
}

/// `null` clears a grade; otherwise it must be a number in 0..=10.
pub fn parse_grade(v: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    let n = v
        .as_f64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number or null", key)))?;
    if !(0.0..=10.0).contains(&n) {
        return Err(HandlerErr::bad_params(format!("{} must be in 0..=10", key)));
    }
    Ok(Some(n))
}

pub fn parse_date(s: &str, key: &str) -> Result<chrono::NaiveDate, HandlerErr> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn require_student(store: &Store<'_>, nre: &str) -> Result<Student, HandlerErr> {
    store
        .students()
        .map_err(query_failed)?
        .into_iter()
        .find(|s| s.nre == nre)
        .ok_or_else(|| HandlerErr::not_found("student not found").with_details(serde_json::json!({ "nre": nre })))
}

pub fn require_service(store: &Store<'_>, service_id: &str) -> Result<Service, HandlerErr> {
    store
        .find_service(service_id)
        .map_err(query_failed)?
        .ok_or_else(|| {
            HandlerErr::not_found("service not found")
                .with_details(serde_json::json!({ "serviceId": service_id }))
        })
}

/// A service whose evaluations and roles may still change.
pub fn require_open_service(store: &Store<'_>, service_id: &str) -> Result<Service, HandlerErr> {
    let service = require_service(store, service_id)?;
    if service.is_finalized() {
        return Err(HandlerErr::new("service_finalized", "service is finalized")
            .with_details(serde_json::json!({ "serviceId": service_id })));
    }
    Ok(service)
}
