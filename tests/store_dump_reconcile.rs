use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_kitchenbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn kitchenbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

#[test]
fn browser_dump_import_defaults_corrupt_entries_and_reconciles() {
    let workspace = temp_dir("kitchenbook-dump");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "clear", "store.diagnostics", json!({ "clear": true }));

    let students = json!([
        { "nre": "123456", "apellido1": "García", "apellido2": "López", "nombre": "Ana", "grupo": "2ºDAW" },
        { "nre": "789012", "apellido1": "Martínez", "apellido2": "Ruiz", "nombre": "Carlos", "grupo": "2ºDAW" }
    ]);
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "import",
        "store.importBrowserDump",
        json!({
            "entries": {
                "teacher-dashboard-students": students.to_string(),
                "practicaServices": "[{\"id\": \"S1\", \"name\": ",
                "planningAssignments": { "S-gone": { "123456": "Cocinero" } },
                "studentGroupAssignments": { "123456": "Grupo 1", "ghost": "Grupo 2" },
                "theme": "dark"
            }
        }),
    );
    assert_eq!(report["skipped"], json!(["theme"]));
    assert_eq!(report["defaulted"], json!(["practicaServices"]));
    assert_eq!(report["imported"].as_array().map(|a| a.len()), Some(3));

    let diagnostics = request_ok(&mut stdin, &mut reader, "diag", "store.diagnostics", json!({}));
    let events = diagnostics["events"].as_array().expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["key"].as_str(), Some("practicaServices"));

    let listed = request_ok(&mut stdin, &mut reader, "list", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(2));
    let services = request_ok(&mut stdin, &mut reader, "services", "services.list", json!({}));
    assert_eq!(services["services"], json!([]));

    let reconciled = request_ok(&mut stdin, &mut reader, "reconcile", "store.reconcile", json!({}));
    assert_eq!(reconciled["report"]["roleAssignmentsRemoved"].as_u64(), Some(1));
    assert_eq!(reconciled["report"]["groupAssignmentsRemoved"].as_u64(), Some(1));
    assert_eq!(reconciled["removed"].as_u64(), Some(2));

    let second = request_ok(&mut stdin, &mut reader, "reconcile-2", "store.reconcile", json!({}));
    assert_eq!(second["removed"].as_u64(), Some(0));

    let dump = request_ok(&mut stdin, &mut reader, "export", "store.exportBrowserDump", json!({}));
    let entries = dump["entries"].as_object().expect("entries");
    assert_eq!(entries.len(), 8);
    let planning: serde_json::Value = serde_json::from_str(
        entries["planningAssignments"].as_str().expect("planning text"),
    )
    .expect("planning json");
    assert_eq!(planning, json!({}));
    let exported_students: serde_json::Value = serde_json::from_str(
        entries["teacher-dashboard-students"].as_str().expect("students text"),
    )
    .expect("students json");
    assert_eq!(exported_students[1]["nombre"].as_str(), Some("Carlos"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn deleting_a_student_prunes_their_rows() {
    let workspace = temp_dir("kitchenbook-cascade");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student",
        "students.create",
        json!({ "student": { "nre": "F1", "nombre": "Fernando", "apellido1": "Mora" } }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "svc",
        "services.create",
        json!({ "name": "Servicio", "date": "2024-10-09", "trimester": 1 }),
    );
    let service_id = created["service"]["id"].as_str().expect("service id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "group",
        "practiceGroups.assign",
        json!({ "nre": "F1", "group": "Grupo 3" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "role",
        "planning.assignRole",
        json!({ "serviceId": service_id, "nre": "F1", "role": "Ayudante" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "score",
        "evaluations.setIndividualScore",
        json!({ "serviceId": service_id, "nre": "F1", "itemId": "i1", "score": 0.5 }),
    );

    let deleted = request_ok(&mut stdin, &mut reader, "delete", "students.delete", json!({ "nre": "F1" }));
    assert_eq!(deleted["pruned"]["individualEvaluationsRemoved"].as_u64(), Some(1));
    assert_eq!(deleted["pruned"]["roleAssignmentsRemoved"].as_u64(), Some(1));
    assert_eq!(deleted["pruned"]["groupAssignmentsRemoved"].as_u64(), Some(1));

    let groups = request_ok(&mut stdin, &mut reader, "groups", "practiceGroups.get", json!({}));
    assert_eq!(groups["assignments"], json!({}));

    let deleted_service = request_ok(
        &mut stdin,
        &mut reader,
        "delete-svc",
        "services.delete",
        json!({ "id": service_id }),
    );
    assert_eq!(deleted_service["ok"].as_bool(), Some(true));
    let missing = request(
        &mut stdin,
        &mut reader,
        "form",
        "evaluations.form",
        json!({ "serviceId": service_id }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn deleting_a_student_keeps_their_rows_in_finalized_services() {
    let workspace = temp_dir("kitchenbook-cascade-finalized");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student",
        "students.create",
        json!({ "student": { "nre": "1", "nombre": "Lucía", "apellido1": "Sanz" } }),
    );
    let closed = request_ok(
        &mut stdin,
        &mut reader,
        "svc-1",
        "services.create",
        json!({ "name": "Servicio cerrado", "date": "2024-10-02", "trimester": 1 }),
    );
    let closed_id = closed["service"]["id"].as_str().expect("service id").to_string();
    let open = request_ok(
        &mut stdin,
        &mut reader,
        "svc-2",
        "services.create",
        json!({ "name": "Servicio abierto", "date": "2024-10-09", "trimester": 1 }),
    );
    let open_id = open["service"]["id"].as_str().expect("service id").to_string();
    for (id, service_id, role) in [("r1", &closed_id, "Jefe de Cocina"), ("r2", &open_id, "Cocinero")] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "planning.assignRole",
            json!({ "serviceId": service_id, "nre": "1", "role": role }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "evaluations.setIndividualScore",
            json!({ "serviceId": service_id, "nre": "1", "itemId": "i1", "score": 0.5 }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "finalize",
        "services.setFinalized",
        json!({ "id": closed_id, "finalized": true }),
    );

    let deleted = request_ok(&mut stdin, &mut reader, "delete", "students.delete", json!({ "nre": "1" }));
    assert_eq!(deleted["pruned"]["individualEvaluationsRemoved"].as_u64(), Some(1));
    assert_eq!(deleted["pruned"]["roleAssignmentsRemoved"].as_u64(), Some(1));
    assert_eq!(deleted["pruned"]["retainedInFinalized"].as_u64(), Some(2));

    let dump = request_ok(&mut stdin, &mut reader, "export", "store.exportBrowserDump", json!({}));
    let entries = dump["entries"].as_object().expect("entries");
    let evaluations: serde_json::Value = serde_json::from_str(
        entries["teacher-dashboard-evaluations"].as_str().expect("evaluations text"),
    )
    .expect("evaluations json");
    let individual = evaluations["individual"].as_array().expect("individual");
    assert_eq!(individual.len(), 1);
    assert_eq!(individual[0]["serviceId"].as_str(), Some(closed_id.as_str()));
    let planning: serde_json::Value = serde_json::from_str(
        entries["planningAssignments"].as_str().expect("planning text"),
    )
    .expect("planning json");
    assert_eq!(planning[&closed_id]["1"].as_str(), Some("Jefe de Cocina"));
    assert_eq!(planning[&open_id], json!({}));

    let again = request_ok(&mut stdin, &mut reader, "reconcile", "store.reconcile", json!({}));
    assert_eq!(again["removed"].as_u64(), Some(0));
    assert_eq!(again["report"]["retainedInFinalized"].as_u64(), Some(2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn browser_dump_students_are_trimmed_and_deduplicated() {
    let workspace = temp_dir("kitchenbook-dump-nre");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let students = json!([
        { "nre": "1", "nombre": "Ana" },
        { "nre": "1", "nombre": "Repetida" },
        { "nre": " 2 ", "nombre": "Carlos" }
    ]);
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "import",
        "store.importBrowserDump",
        json!({ "entries": { "teacher-dashboard-students": students.to_string() } }),
    );
    assert_eq!(report["imported"], json!(["teacher-dashboard-students"]));
    let rejected = report["rejected"].as_array().expect("rejected");
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].as_str().unwrap_or("").contains("duplicate nre 1"));

    let listed = request_ok(&mut stdin, &mut reader, "list", "students.list", json!({}));
    let nres: Vec<&str> = listed["students"]
        .as_array()
        .expect("students")
        .iter()
        .filter_map(|s| s["nre"].as_str())
        .collect();
    assert_eq!(nres.len(), 2);
    assert!(nres.contains(&"1") && nres.contains(&"2"));

    let fetched = request_ok(&mut stdin, &mut reader, "get", "students.get", json!({ "nre": "2" }));
    assert_eq!(fetched["student"]["nombre"].as_str(), Some("Carlos"));
    let _ = request_ok(&mut stdin, &mut reader, "delete", "students.delete", json!({ "nre": "2" }));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
