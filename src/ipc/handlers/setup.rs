use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roles::{RoleCatalog, DEFAULT_LEADER_ROLES, DEFAULT_SECONDARY_ROLES, UNASSIGNED};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Teacher,
    Institute,
    Practice,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Teacher, Self::Institute, Self::Practice];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "teacher" => Some(Self::Teacher),
            "institute" => Some(Self::Institute),
            "practice" => Some(Self::Practice),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Institute => "institute",
            Self::Practice => "practice",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Teacher => "setup.teacher",
            Self::Institute => "setup.institute",
            Self::Practice => "setup.practice",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Teacher => json!({
            "name": "",
            "email": "",
            "logo": null
        }),
        SetupSection::Institute => json!({
            "name": "",
            "address": "",
            "cif": "",
            "logo": null
        }),
        SetupSection::Practice => json!({
            "leaderRoles": DEFAULT_LEADER_ROLES,
            "secondaryRoles": DEFAULT_SECONDARY_ROLES,
            "upcomingServicesLimit": 5,
            "recentAnnotationsLimit": 5,
            "printRowsPerPage": 25
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// Logos are stored inline as data URLs.
fn parse_logo(v: &Value, key: &str) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let s = parse_string_max(v, key, 2_000_000)?;
    if s.is_empty() {
        return Ok(Value::Null);
    }
    if !s.starts_with("data:image/") {
        return Err(format!("{} must be a data:image/ URL", key));
    }
    Ok(Value::String(s))
}

fn parse_role_list(v: &Value, key: &str) -> Result<Vec<String>, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array of strings", key))?;
    let mut out: Vec<String> = Vec::new();
    for item in arr {
        let name = parse_string_max(item, key, 64)?;
        if name.is_empty() {
            return Err(format!("{} entries must not be blank", key));
        }
        if name == UNASSIGNED {
            return Err(format!("{} cannot be used as a role name", UNASSIGNED));
        }
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Teacher => match k.as_str() {
                "name" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "email" => {
                    let s = parse_string_max(v, k, 254)?;
                    if !s.is_empty() && !s.contains('@') {
                        return Err("email must contain @".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "logo" => {
                    obj.insert(k.clone(), parse_logo(v, k)?);
                }
                _ => return Err(format!("unknown teacher field: {}", k)),
            },
            SetupSection::Institute => match k.as_str() {
                "name" | "address" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 200)?));
                }
                "cif" => {
                    obj.insert(
                        k.clone(),
                        Value::String(parse_string_max(v, k, 16)?.to_ascii_uppercase()),
                    );
                }
                "logo" => {
                    obj.insert(k.clone(), parse_logo(v, k)?);
                }
                _ => return Err(format!("unknown institute field: {}", k)),
            },
            SetupSection::Practice => match k.as_str() {
                "leaderRoles" | "secondaryRoles" => {
                    obj.insert(k.clone(), json!(parse_role_list(v, k)?));
                }
                "upcomingServicesLimit" | "recentAnnotationsLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 50)?));
                }
                "printRowsPerPage" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 200)?));
                }
                _ => return Err(format!("unknown practice field: {}", k)),
            },
        }
    }

    if let SetupSection::Practice = section {
        let leaders = obj.get("leaderRoles").and_then(|v| v.as_array());
        let secondary = obj.get("secondaryRoles").and_then(|v| v.as_array());
        if let (Some(l), Some(s)) = (leaders, secondary) {
            if l.iter().any(|r| s.contains(r)) {
                return Err("a role cannot be both leader and secondary".into());
            }
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Keep the defaults when an old saved value no longer validates.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %msg, "ignoring saved setup");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Practice settings other handlers read.
#[derive(Debug, Clone)]
pub struct PracticeSettings {
    pub catalog: RoleCatalog,
    pub upcoming_services_limit: usize,
    pub recent_annotations_limit: usize,
    pub print_rows_per_page: usize,
}

fn string_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|a| a.as_array())
        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn usize_field(v: &Value, key: &str, fallback: usize) -> usize {
    v.get(key)
        .and_then(|n| n.as_u64())
        .map(|n| n as usize)
        .unwrap_or(fallback)
}

pub fn practice_settings(conn: &rusqlite::Connection) -> anyhow::Result<PracticeSettings> {
    let v = load_section(conn, SetupSection::Practice)?;
    Ok(PracticeSettings {
        catalog: RoleCatalog {
            leader_roles: string_list(&v, "leaderRoles"),
            secondary_roles: string_list(&v, "secondaryRoles"),
        },
        upcoming_services_limit: usize_field(&v, "upcomingServicesLimit", crate::dashboard::UPCOMING_LIMIT),
        recent_annotations_limit: usize_field(&v, "recentAnnotationsLimit", crate::dashboard::RECENT_LIMIT),
        print_rows_per_page: usize_field(&v, "printRowsPerPage", 25),
    })
}

/// Teacher and institute profiles, used as print headers.
pub fn profiles(conn: &rusqlite::Connection) -> anyhow::Result<(Value, Value)> {
    Ok((
        load_section(conn, SetupSection::Teacher)?,
        load_section(conn, SetupSection::Institute)?,
    ))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(&req.id, json!({ "ok": true, "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
