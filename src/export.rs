//! Shapes the service summary for spreadsheet and print output.

use crate::scoring::{SummaryModel, SummaryService};
use serde::Serialize;

pub const ABSENT_LABEL: &str = "AUSENTE";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn column_base(service: &SummaryService) -> String {
    service.name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn fmt2(v: f64) -> String {
    format!("{:.2}", v)
}

/// One row per student in summary order; absent services leave the group and
/// individual cells blank and mark the total.
pub fn spreadsheet_table(model: &SummaryModel) -> ExportTable {
    let mut headers = vec!["Grupo Académico".to_string(), "Alumno".to_string()];
    for svc in &model.services {
        let base = column_base(svc);
        headers.push(format!("{}_Grupo", base));
        headers.push(format!("{}_Individual", base));
        headers.push(format!("{}_Total", base));
    }
    headers.push("Media_Final_Servicios".to_string());

    let mut rows = Vec::new();
    for group in &model.groups {
        for student in &group.students {
            let mut row = vec![group.name.clone(), student.display_name.clone()];
            for svc in &model.services {
                let scores = student.sheet.service_scores.get(&svc.id);
                match scores.and_then(|s| s.group.zip(s.individual)) {
                    Some((g, i)) => {
                        row.push(fmt2(g));
                        row.push(fmt2(i));
                        row.push(fmt2(g + i));
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                        row.push(ABSENT_LABEL.to_string());
                    }
                }
            }
            row.push(fmt2(student.sheet.average));
            rows.push(row);
        }
    }
    ExportTable { headers, rows }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn to_csv(table: &ExportTable) -> String {
    let mut out = String::new();
    let line = |cells: &[String]| cells.iter().map(|c| csv_quote(c)).collect::<Vec<_>>().join(",");
    out.push_str(&line(&table.headers));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintCell {
    pub text: String,
    pub colspan: usize,
}

impl PrintCell {
    fn one(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            colspan: 1,
        }
    }

    fn span(text: impl Into<String>, colspan: usize) -> Self {
        Self {
            text: text.into(),
            colspan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PrintRowKind {
    GroupHeader,
    Student,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRow {
    pub kind: PrintRowKind,
    pub cells: Vec<PrintCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintTable {
    pub head: Vec<Vec<PrintCell>>,
    pub pages: Vec<Vec<PrintRow>>,
    pub column_count: usize,
}

/// Table layout for the printed summary. `rows_per_page == 0` keeps the body
/// on a single page.
pub fn print_table(model: &SummaryModel, rows_per_page: usize) -> PrintTable {
    let column_count = 2 + model.services.len() * 3;

    let mut first = vec![PrintCell::one("Alumno")];
    let mut second = vec![PrintCell::one("")];
    for svc in &model.services {
        first.push(PrintCell::span(svc.name.clone(), 3));
        second.push(PrintCell::one("G"));
        second.push(PrintCell::one("I"));
        second.push(PrintCell::one("Total"));
    }
    first.push(PrintCell::one("Media Final"));
    second.push(PrintCell::one(""));

    let mut body = Vec::new();
    for group in &model.groups {
        body.push(PrintRow {
            kind: PrintRowKind::GroupHeader,
            cells: vec![PrintCell::span(group.name.clone(), column_count)],
        });
        for student in &group.students {
            let mut cells = vec![PrintCell::one(student.display_name.clone())];
            for svc in &model.services {
                let scores = student.sheet.service_scores.get(&svc.id);
                match scores.and_then(|s| s.group.zip(s.individual)) {
                    Some((g, i)) => {
                        cells.push(PrintCell::one(fmt2(g)));
                        cells.push(PrintCell::one(fmt2(i)));
                        cells.push(PrintCell::one(fmt2(g + i)));
                    }
                    None => cells.push(PrintCell::span(ABSENT_LABEL, 3)),
                }
            }
            cells.push(PrintCell::one(fmt2(student.sheet.average)));
            body.push(PrintRow {
                kind: PrintRowKind::Student,
                cells,
            });
        }
    }

    let pages = if body.is_empty() {
        Vec::new()
    } else if rows_per_page == 0 {
        vec![body]
    } else {
        body.chunks(rows_per_page).map(|c| c.to_vec()).collect()
    };

    PrintTable {
        head: vec![first, second],
        pages,
        column_count,
    }
}
