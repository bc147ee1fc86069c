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
fn workspace_bundle_restores_into_a_new_workspace() {
    let source = temp_dir("kitchenbook-bundle-src");
    let target = temp_dir("kitchenbook-bundle-dst");
    let bundle = source.join("exports").join("backup.kbk.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "student",
        "students.create",
        json!({ "student": { "nre": "G1", "nombre": "Gloria", "apellido1": "Navarro" } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "teacher",
        "setup.update",
        json!({ "section": "teacher", "patch": { "name": "Marta Sanz", "email": "marta@ies.es" } }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "export",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"].as_str(), Some("kitchenbook-workspace-v1"));
    assert_eq!(exported["entryCount"].as_u64(), Some(3));
    let sha = exported["dbSha256"].as_str().expect("sha").to_string();
    assert_eq!(sha.len(), 64);
    assert!(bundle.is_file());

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "import",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": target.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"].as_str(), Some("kitchenbook-workspace-v1"));
    assert_eq!(imported["dbSha256"].as_str(), Some(sha.as_str()));

    let health = request_ok(&mut stdin, &mut reader, "health", "health", json!({}));
    assert_eq!(health["workspacePath"].as_str().map(PathBuf::from), Some(target.clone()));
    let students = request_ok(&mut stdin, &mut reader, "list", "students.list", json!({}));
    assert_eq!(students["students"][0]["nre"].as_str(), Some("G1"));
    let setup = request_ok(&mut stdin, &mut reader, "setup", "setup.get", json!({}));
    assert_eq!(setup["teacher"]["name"].as_str(), Some("Marta Sanz"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(target);
}

#[test]
fn unreadable_bundles_are_rejected_and_the_session_survives() {
    let workspace = temp_dir("kitchenbook-bundle-bad");
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
        json!({ "student": { "nre": "H1", "nombre": "Hugo" } }),
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "missing",
        "backup.importWorkspaceBundle",
        json!({ "inPath": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let junk = workspace.join("junk.zip");
    std::fs::write(&junk, b"not a zip archive").expect("write junk");
    let broken = request(
        &mut stdin,
        &mut reader,
        "junk",
        "backup.importWorkspaceBundle",
        json!({ "inPath": junk.to_string_lossy() }),
    );
    assert_eq!(error_code(&broken), Some("io_failed"));

    let students = request_ok(&mut stdin, &mut reader, "list", "students.list", json!({}));
    assert_eq!(students["students"][0]["nre"].as_str(), Some("H1"));

    let no_out = request(&mut stdin, &mut reader, "no-out", "backup.exportWorkspaceBundle", json!({}));
    assert_eq!(error_code(&no_out), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
