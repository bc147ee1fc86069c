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

const T1_CRITERIA: &[&str] = &[
    "ra1c1", "ra1c2", "ra2c1", "ra2c2", "ra2c3", "ra3c1", "ra3c2", "ra3c3", "ra4c1", "ra4c2", "ra4c3",
];

fn approx(v: &serde_json::Value, expected: f64) -> bool {
    v.as_f64().map(|n| (n - expected).abs() < 1e-9).unwrap_or(false)
}

fn open_with_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "student",
        "students.create",
        json!({ "student": { "nre": "K1", "nombre": "Karen", "apellido1": "Ortega", "grupo": "1ºCOC" } }),
    );
}

#[test]
fn trimester_report_combines_theory_services_and_practical_exam() {
    let workspace = temp_dir("kitchenbook-academic");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_with_student(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "pg",
        "practiceGroups.assign",
        json!({ "nre": "K1", "group": "Grupo 1" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "svc",
        "services.create",
        json!({ "name": "Servicio 1", "date": "2024-10-02", "trimester": 1, "groupAssignments": { "comedor": ["Grupo 1"] } }),
    );
    let service_id = created["service"]["id"].as_str().expect("service id").to_string();
    for (item, score) in [("g1", 1.0), ("g2", 1.5), ("g3", 1.0), ("g4", 1.5)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g-{}", item),
            "evaluations.setGroupScore",
            json!({ "serviceId": service_id, "groupId": "Grupo 1", "itemId": item, "score": score }),
        );
    }
    for (item, score) in [("i1", 0.5), ("i2", 1.0), ("i3", 1.5), ("i4", 1.0), ("i5", 1.0)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("i-{}", item),
            "evaluations.setIndividualScore",
            json!({ "serviceId": service_id, "nre": "K1", "itemId": item, "score": score }),
        );
    }

    let theory = request_ok(
        &mut stdin,
        &mut reader,
        "theory",
        "academic.setTheoryGrades",
        json!({ "nre": "K1", "grades": { "examen1": 8, "examen2": 6 } }),
    );
    assert!(approx(&theory["grades"]["examen1"], 8.0));
    let bad_key = request(
        &mut stdin,
        &mut reader,
        "theory-bad",
        "academic.setTheoryGrades",
        json!({ "nre": "K1", "grades": { "examen9": 5 } }),
    );
    assert_eq!(error_code(&bad_key), Some("bad_params"));
    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "theory-range",
        "academic.setTheoryGrades",
        json!({ "nre": "K1", "grades": { "examen3": 10.5 } }),
    );
    assert_eq!(error_code(&out_of_range), Some("bad_params"));

    let scores: Vec<serde_json::Value> = T1_CRITERIA
        .iter()
        .map(|c| json!({ "criterionId": c, "score": 10 }))
        .collect();
    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "exam",
        "exams.upsert",
        json!({ "exam": { "studentNre": "K1", "examType": "T1", "scores": scores, "startTime": "09:00" } }),
    );
    assert!(approx(&exam["finalScore"], 10.0));
    assert_eq!(exam["areas"].as_array().map(|a| a.len()), Some(4));

    let bad_level = request(
        &mut stdin,
        &mut reader,
        "exam-level",
        "exams.upsert",
        json!({ "exam": { "studentNre": "K1", "examType": "T1", "scores": [{ "criterionId": "ra1c1", "score": 7 }] } }),
    );
    assert_eq!(error_code(&bad_level), Some("bad_params"));
    let bad_criterion = request(
        &mut stdin,
        &mut reader,
        "exam-criterion",
        "exams.upsert",
        json!({ "exam": { "studentNre": "K1", "examType": "T1", "scores": [{ "criterionId": "ra1c4", "score": 8 }] } }),
    );
    assert_eq!(error_code(&bad_criterion), Some("bad_params"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "exams",
        "exams.list",
        json!({ "nre": "K1", "examType": "T1" }),
    );
    assert_eq!(listed["exams"].as_array().map(|a| a.len()), Some(1));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "report",
        "academic.studentReport",
        json!({ "nre": "K1" }),
    );
    let first = &report["report"]["trimesters"][0];
    let services = first["instruments"]
        .as_array()
        .expect("instruments")
        .iter()
        .find(|i| i["key"].as_str() == Some("servicios1"))
        .expect("services instrument");
    assert!(approx(&services["value"], 5.0));
    assert!(approx(&first["grade"], 7.3));
    assert!(report["report"]["trimesters"][1]["instruments"][0]["value"].is_null());
    assert!(approx(&report["report"]["ordinary"], 3.65));
    assert!(report["report"]["recovery"].is_null());
    assert!(approx(&report["report"]["final"], 3.65));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "rec",
        "academic.setTheoryGrades",
        json!({ "nre": "K1", "grades": { "recuperacion": 9 } }),
    );
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "report-2",
        "academic.studentReport",
        json!({ "nre": "K1" }),
    );
    assert!(approx(&report["report"]["recovery"]["grade"], 4.5));
    assert!(approx(&report["report"]["final"], 4.5));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "exam-del",
        "exams.delete",
        json!({ "nre": "K1", "examType": "T1" }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "exam-del-again",
        "exams.delete",
        json!({ "nre": "K1", "examType": "T1" }),
    );
    assert_eq!(error_code(&gone), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn course_module_grades_respect_module_length() {
    let workspace = temp_dir("kitchenbook-course");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_with_student(&mut stdin, &mut reader, &workspace);

    let partial = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "ofertas_gastronomicas", "grades": { "t1": 6 } }),
    );
    assert!(partial["final"].is_null());

    let complete = request_ok(
        &mut stdin,
        &mut reader,
        "t2",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "ofertas_gastronomicas", "grades": { "t2": 8 } }),
    );
    assert!(approx(&complete["final"], 7.0));

    let no_third = request(
        &mut stdin,
        &mut reader,
        "t3",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "ofertas_gastronomicas", "grades": { "t3": 5 } }),
    );
    assert_eq!(error_code(&no_third), Some("bad_params"));

    let project = request_ok(
        &mut stdin,
        &mut reader,
        "project",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "proyecto_intermodular", "grades": { "t1": 5, "t2": 6, "t3": 7 } }),
    );
    assert!(approx(&project["final"], 6.0));

    let recovered = request_ok(
        &mut stdin,
        &mut reader,
        "rec",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "proyecto_intermodular", "grades": { "rec": 5 } }),
    );
    assert!(approx(&recovered["final"], 5.0));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "unknown",
        "course.setGrades",
        json!({ "nre": "K1", "moduleKey": "panaderia", "grades": { "t1": 5 } }),
    );
    assert_eq!(error_code(&unknown), Some("not_found"));

    let course = request_ok(&mut stdin, &mut reader, "get", "course.get", json!({ "nre": "K1" }));
    let modules = course["modules"].as_array().expect("modules");
    assert_eq!(modules.len(), 7);
    assert_eq!(modules[0]["key"].as_str(), Some("ofertas_gastronomicas"));
    assert!(approx(&modules[0]["final"], 7.0));
    assert!(modules[1]["final"].is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
