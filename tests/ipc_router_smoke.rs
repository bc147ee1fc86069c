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
fn every_method_family_is_routed() {
    let workspace = temp_dir("kitchenbook-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    // Static rubrics answer before any workspace is chosen.
    let rubric = request_ok(&mut stdin, &mut reader, "2", "rubric.get", json!({}));
    assert_eq!(rubric["group"]["maxTotal"].as_f64(), Some(10.0));
    assert_eq!(rubric["individual"]["items"].as_array().map(|a| a.len()), Some(10));
    let exam_rubric = request_ok(&mut stdin, &mut reader, "3", "exams.rubric", json!({ "examType": "T1" }));
    assert_eq!(exam_rubric["areas"].as_array().map(|a| a.len()), Some(4));

    let no_ws = request(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({ "student": { "nre": "1001", "apellido1": "García", "apellido2": "López", "nombre": "Ana", "grupo": "2ºDAW" } }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "services.create",
        json!({ "name": "Servicio 1", "date": "2024-10-02", "trimester": 1, "groupAssignments": { "comedor": ["Grupo 1"], "takeaway": [] } }),
    );
    let service_id = created["service"]["id"].as_str().expect("service id").to_string();

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("setup.get", json!({})),
        ("students.list", json!({})),
        ("students.get", json!({ "nre": "1001" })),
        ("services.list", json!({})),
        ("practiceGroups.get", json!({})),
        ("planning.roles", json!({})),
        ("planning.grid", json!({})),
        ("evaluations.form", json!({ "serviceId": service_id })),
        ("evaluations.studentScores", json!({ "nre": "1001" })),
        ("evaluations.summary", json!({})),
        ("evaluations.exportCsv", json!({})),
        ("evaluations.printModel", json!({})),
        ("exams.list", json!({})),
        ("academic.studentReport", json!({ "nre": "1001" })),
        ("course.get", json!({ "nre": "1001" })),
        ("dashboard.summary", json!({ "today": "2024-10-01" })),
        ("store.diagnostics", json!({})),
        ("store.reconcile", json!({})),
        ("store.exportBrowserDump", json!({})),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("call-{}", i);
        let _ = request_ok(&mut stdin, &mut reader, &id, method, params);
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_methods_and_bad_lines_get_error_replies() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let unknown = request(&mut stdin, &mut reader, "u1", "marks.compute", json!({}));
    assert_eq!(unknown.get("id").and_then(|v| v.as_str()), Some("u1"));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "this is not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let reply: serde_json::Value = serde_json::from_str(line.trim()).expect("parse reply");
    assert_eq!(reply.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&reply), Some("bad_json"));

    // The loop keeps serving after a bad line.
    let health = request(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
}
