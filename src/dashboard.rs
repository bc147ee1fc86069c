use crate::model::{AnnotationKind, Service, Student};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

pub const UPCOMING_LIMIT: usize = 5;
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingService {
    pub id: String,
    pub name: String,
    pub date: String,
    pub trimester: u8,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnnotation {
    pub id: String,
    pub date: String,
    pub note: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub subtype: Option<String>,
    pub student_nre: String,
    pub student_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub total_groups: usize,
    pub upcoming_services: Vec<UpcomingService>,
    pub recent_annotations: Vec<RecentAnnotation>,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn dashboard_summary(
    students: &[Student],
    services: &[Service],
    today: NaiveDate,
    upcoming_limit: usize,
    recent_limit: usize,
) -> DashboardSummary {
    let groups: BTreeSet<&str> = students
        .iter()
        .map(|s| s.group.trim())
        .filter(|g| !g.is_empty())
        .collect();

    let mut upcoming: Vec<(NaiveDate, &Service)> = services
        .iter()
        .filter_map(|s| parse_date(&s.date).map(|d| (d, s)))
        .filter(|(d, _)| *d >= today)
        .collect();
    upcoming.sort_by_key(|(d, _)| *d);

    let mut recent: Vec<RecentAnnotation> = students
        .iter()
        .flat_map(|s| {
            s.annotations
                .iter()
                .flatten()
                .map(move |a| RecentAnnotation {
                    id: a.id.clone(),
                    date: a.date.clone(),
                    note: a.note.clone(),
                    kind: a.kind,
                    subtype: a.subtype.clone(),
                    student_nre: s.nre.clone(),
                    student_name: s.short_name(),
                })
        })
        .collect();
    // ISO dates sort lexically; stable sort keeps insertion order on ties.
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(recent_limit);

    DashboardSummary {
        total_students: students.len(),
        total_groups: groups.len(),
        upcoming_services: upcoming
            .into_iter()
            .take(upcoming_limit)
            .map(|(_, s)| UpcomingService {
                id: s.id.clone(),
                name: s.name.clone(),
                date: s.date.clone(),
                trimester: s.trimester,
                groups: s.group_assignments.assigned_groups(),
            })
            .collect(),
        recent_annotations: recent,
    }
}
