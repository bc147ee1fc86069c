//! Typed repository over the workspace blob table.
//!
//! Every persisted collection is read and written here. A missing key or a
//! blob that no longer parses yields the collection's default value; parse
//! failures are reported to the injected [`StoreObserver`] so corruption is
//! never silent.

use crate::db;
use crate::model::{
    AcademicGrades, CourseGrades, EvaluationsState, PlanningAssignments, Service, Student,
    StudentGroupAssignments, StudentPracticalExam,
};
use anyhow::Context;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Students,
    Evaluations,
    Services,
    PlanningAssignments,
    StudentGroupAssignments,
    PracticalExams,
    AcademicGrades,
    CourseGrades,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Students,
        Collection::Evaluations,
        Collection::Services,
        Collection::PlanningAssignments,
        Collection::StudentGroupAssignments,
        Collection::PracticalExams,
        Collection::AcademicGrades,
        Collection::CourseGrades,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Students => "teacher-dashboard-students",
            Self::Evaluations => "teacher-dashboard-evaluations",
            Self::Services => "practicaServices",
            Self::PlanningAssignments => "planningAssignments",
            Self::StudentGroupAssignments => "studentGroupAssignments",
            Self::PracticalExams => "teacher-dashboard-practical-exams",
            Self::AcademicGrades => "teacher-dashboard-academic-grades",
            Self::CourseGrades => "teacher-dashboard-course-grades",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDiagnostic {
    pub key: String,
    pub message: String,
    pub at: String,
}

/// Receives notice of persisted data the store had to discard.
pub trait StoreObserver {
    fn blob_discarded(&self, key: &str, error: &str);
}

/// Logs discarded blobs and keeps the most recent ones for inspection.
#[derive(Debug, Default)]
pub struct Diagnostics {
    events: RefCell<VecDeque<StoreDiagnostic>>,
}

const MAX_DIAGNOSTICS: usize = 100;

impl Diagnostics {
    pub fn snapshot(&self) -> Vec<StoreDiagnostic> {
        self.events.borrow().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl StoreObserver for Diagnostics {
    fn blob_discarded(&self, key: &str, error: &str) {
        tracing::warn!(key, error, "discarding unreadable stored collection, using default");
        let mut events = self.events.borrow_mut();
        if events.len() >= MAX_DIAGNOSTICS {
            events.pop_front();
        }
        events.push_back(StoreDiagnostic {
            key: key.to_string(),
            message: error.to_string(),
            at: chrono::Utc::now().to_rfc3339(),
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub group_evaluations_removed: usize,
    pub individual_evaluations_removed: usize,
    pub role_assignments_removed: usize,
    pub group_assignments_removed: usize,
    pub practical_exams_removed: usize,
    pub academic_grades_removed: usize,
    pub course_grades_removed: usize,
    /// Rows of missing students kept because their service is finalized.
    pub retained_in_finalized: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.group_evaluations_removed
            + self.individual_evaluations_removed
            + self.role_assignments_removed
            + self.group_assignments_removed
            + self.practical_exams_removed
            + self.academic_grades_removed
            + self.course_grades_removed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpImportReport {
    pub imported: Vec<String>,
    pub defaulted: Vec<String>,
    pub skipped: Vec<String>,
    pub rejected: Vec<String>,
}

pub struct Store<'a> {
    conn: &'a Connection,
    observer: &'a dyn StoreObserver,
}

impl<'a> Store<'a> {
    pub fn new(conn: &'a Connection, observer: &'a dyn StoreObserver) -> Self {
        Self { conn, observer }
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    fn load<T: DeserializeOwned + Default>(&self, c: Collection) -> anyhow::Result<T> {
        let Some(raw) = db::blob_get(self.conn, c.key())
            .with_context(|| format!("failed to read {}", c.key()))?
        else {
            return Ok(T::default());
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.observer.blob_discarded(c.key(), &e.to_string());
                Ok(T::default())
            }
        }
    }

    fn save<T: Serialize>(&self, c: Collection, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {}", c.key()))?;
        db::blob_set(self.conn, c.key(), &raw)
            .with_context(|| format!("failed to write {}", c.key()))?;
        tracing::debug!(key = c.key(), bytes = raw.len(), "collection saved");
        Ok(())
    }

    pub fn students(&self) -> anyhow::Result<Vec<Student>> {
        self.load(Collection::Students)
    }

    pub fn set_students(&self, v: &[Student]) -> anyhow::Result<()> {
        self.save(Collection::Students, &v)
    }

    pub fn evaluations(&self) -> anyhow::Result<EvaluationsState> {
        self.load(Collection::Evaluations)
    }

    pub fn set_evaluations(&self, v: &EvaluationsState) -> anyhow::Result<()> {
        self.save(Collection::Evaluations, v)
    }

    pub fn services(&self) -> anyhow::Result<Vec<Service>> {
        self.load(Collection::Services)
    }

    pub fn set_services(&self, v: &[Service]) -> anyhow::Result<()> {
        self.save(Collection::Services, &v)
    }

    pub fn planning(&self) -> anyhow::Result<PlanningAssignments> {
        self.load(Collection::PlanningAssignments)
    }

    pub fn set_planning(&self, v: &PlanningAssignments) -> anyhow::Result<()> {
        self.save(Collection::PlanningAssignments, v)
    }

    pub fn practice_groups(&self) -> anyhow::Result<StudentGroupAssignments> {
        self.load(Collection::StudentGroupAssignments)
    }

    pub fn set_practice_groups(&self, v: &StudentGroupAssignments) -> anyhow::Result<()> {
        self.save(Collection::StudentGroupAssignments, v)
    }

    pub fn practical_exams(&self) -> anyhow::Result<Vec<StudentPracticalExam>> {
        self.load(Collection::PracticalExams)
    }

    pub fn set_practical_exams(&self, v: &[StudentPracticalExam]) -> anyhow::Result<()> {
        self.save(Collection::PracticalExams, &v)
    }

    pub fn academic_grades(&self) -> anyhow::Result<AcademicGrades> {
        self.load(Collection::AcademicGrades)
    }

    pub fn set_academic_grades(&self, v: &AcademicGrades) -> anyhow::Result<()> {
        self.save(Collection::AcademicGrades, v)
    }

    pub fn course_grades(&self) -> anyhow::Result<CourseGrades> {
        self.load(Collection::CourseGrades)
    }

    pub fn set_course_grades(&self, v: &CourseGrades) -> anyhow::Result<()> {
        self.save(Collection::CourseGrades, v)
    }

    pub fn find_service(&self, service_id: &str) -> anyhow::Result<Option<Service>> {
        Ok(self.services()?.into_iter().find(|s| s.id == service_id))
    }

    /// Removes rows that reference a service or student that no longer exists.
    /// Rows inside a finalized service are never touched.
    pub fn reconcile(&self) -> anyhow::Result<ReconcileReport> {
        let student_ids: HashSet<String> = self.students()?.into_iter().map(|s| s.nre).collect();
        let services = self.services()?;
        let finalized: HashSet<String> = services
            .iter()
            .filter(|s| s.is_finalized())
            .map(|s| s.id.clone())
            .collect();
        let service_ids: HashSet<String> = services.into_iter().map(|s| s.id).collect();
        let mut report = ReconcileReport::default();
        let mut retained = 0;

        let mut evals = self.evaluations()?;
        let before = evals.group.len();
        evals.group.retain(|e| service_ids.contains(&e.service_id));
        report.group_evaluations_removed = before - evals.group.len();
        let before = evals.individual.len();
        evals.individual.retain(|e| {
            if !service_ids.contains(&e.service_id) {
                return false;
            }
            if student_ids.contains(&e.student_nre) {
                return true;
            }
            if finalized.contains(&e.service_id) {
                retained += 1;
                return true;
            }
            false
        });
        report.individual_evaluations_removed = before - evals.individual.len();
        if report.group_evaluations_removed + report.individual_evaluations_removed > 0 {
            self.set_evaluations(&evals)?;
        }

        let mut planning = self.planning()?;
        let mut removed = 0;
        planning.retain(|service_id, roles| {
            if !service_ids.contains(service_id) {
                removed += roles.len();
                return false;
            }
            if finalized.contains(service_id) {
                retained += roles.keys().filter(|nre| !student_ids.contains(*nre)).count();
                return true;
            }
            let before = roles.len();
            roles.retain(|nre, _| student_ids.contains(nre));
            removed += before - roles.len();
            true
        });
        report.role_assignments_removed = removed;
        if removed > 0 {
            self.set_planning(&planning)?;
        }

        let mut groups = self.practice_groups()?;
        let before = groups.len();
        groups.retain(|nre, _| student_ids.contains(nre));
        report.group_assignments_removed = before - groups.len();
        if report.group_assignments_removed > 0 {
            self.set_practice_groups(&groups)?;
        }

        let mut exams = self.practical_exams()?;
        let before = exams.len();
        exams.retain(|e| student_ids.contains(&e.student_nre));
        report.practical_exams_removed = before - exams.len();
        if report.practical_exams_removed > 0 {
            self.set_practical_exams(&exams)?;
        }

        let mut academic = self.academic_grades()?;
        let before = academic.len();
        academic.retain(|nre, _| student_ids.contains(nre));
        report.academic_grades_removed = before - academic.len();
        if report.academic_grades_removed > 0 {
            self.set_academic_grades(&academic)?;
        }

        let mut course = self.course_grades()?;
        let before = course.len();
        course.retain(|nre, _| student_ids.contains(nre));
        report.course_grades_removed = before - course.len();
        if report.course_grades_removed > 0 {
            self.set_course_grades(&course)?;
        }

        report.retained_in_finalized = retained;
        if report.total() > 0 {
            tracing::info!(removed = report.total(), "reconcile pruned dangling rows");
        }
        if retained > 0 {
            tracing::info!(retained, "reconcile kept rows of finalized services");
        }
        Ok(report)
    }

    /// Imports a browser storage dump (`key -> JSON text`). Known collections
    /// are parsed into their typed form before being written, so a corrupt
    /// entry is replaced by the default rather than stored verbatim.
    pub fn import_browser_dump(
        &self,
        entries: &serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<DumpImportReport> {
        let mut report = DumpImportReport::default();
        for (key, value) in entries {
            let Some(collection) = Collection::from_key(key) else {
                report.skipped.push(key.clone());
                continue;
            };
            // Storage dumps carry JSON text; accept an inline JSON value too.
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let parsed_ok = self.import_one(collection, &text, &mut report.rejected)?;
            if parsed_ok {
                report.imported.push(key.clone());
            } else {
                report.defaulted.push(key.clone());
            }
        }
        Ok(report)
    }

    fn import_one(&self, c: Collection, text: &str, rejected: &mut Vec<String>) -> anyhow::Result<bool> {
        match c {
            Collection::Students => {
                let Some(students) = self.parse_dump_entry::<Vec<Student>>(c, text)? else {
                    return Ok(false);
                };
                self.set_students(&unique_students(students, rejected))?;
                Ok(true)
            }
            Collection::Evaluations => self.import_typed::<EvaluationsState>(c, text),
            Collection::Services => self.import_typed::<Vec<Service>>(c, text),
            Collection::PlanningAssignments => self.import_typed::<PlanningAssignments>(c, text),
            Collection::StudentGroupAssignments => {
                self.import_typed::<StudentGroupAssignments>(c, text)
            }
            Collection::PracticalExams => self.import_typed::<Vec<StudentPracticalExam>>(c, text),
            Collection::AcademicGrades => self.import_typed::<AcademicGrades>(c, text),
            Collection::CourseGrades => self.import_typed::<CourseGrades>(c, text),
        }
    }

    fn import_typed<T: DeserializeOwned + Default + Serialize>(
        &self,
        c: Collection,
        text: &str,
    ) -> anyhow::Result<bool> {
        let Some(v) = self.parse_dump_entry::<T>(c, text)? else {
            return Ok(false);
        };
        self.save(c, &v)?;
        Ok(true)
    }

    /// Parses one dump entry. An unreadable entry is reported and replaced by
    /// the default, and `None` is returned.
    fn parse_dump_entry<T: DeserializeOwned + Default + Serialize>(
        &self,
        c: Collection,
        text: &str,
    ) -> anyhow::Result<Option<T>> {
        match serde_json::from_str::<T>(text) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                self.observer.blob_discarded(c.key(), &e.to_string());
                self.save(c, &T::default())?;
                Ok(None)
            }
        }
    }

    /// The inverse of [`Store::import_browser_dump`]: every collection as JSON text.
    pub fn export_browser_dump(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        out.insert(Collection::Students.key().to_string(), serde_json::to_string(&self.students()?)?);
        out.insert(Collection::Evaluations.key().to_string(), serde_json::to_string(&self.evaluations()?)?);
        out.insert(Collection::Services.key().to_string(), serde_json::to_string(&self.services()?)?);
        out.insert(Collection::PlanningAssignments.key().to_string(), serde_json::to_string(&self.planning()?)?);
        out.insert(
            Collection::StudentGroupAssignments.key().to_string(),
            serde_json::to_string(&self.practice_groups()?)?,
        );
        out.insert(Collection::PracticalExams.key().to_string(), serde_json::to_string(&self.practical_exams()?)?);
        out.insert(Collection::AcademicGrades.key().to_string(), serde_json::to_string(&self.academic_grades()?)?);
        out.insert(Collection::CourseGrades.key().to_string(), serde_json::to_string(&self.course_grades()?)?);
        Ok(out)
    }
}

/// Trims every nre and keeps the first student for each one. Blank and
/// repeated nre values are dropped and listed in `rejected`.
fn unique_students(students: Vec<Student>, rejected: &mut Vec<String>) -> Vec<Student> {
    let key = Collection::Students.key();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(students.len());
    for (idx, mut student) in students.into_iter().enumerate() {
        let nre = student.nre.trim().to_string();
        if nre.is_empty() {
            tracing::warn!(index = idx, "dropping imported student with blank nre");
            rejected.push(format!("{}[{}]: blank nre", key, idx));
            continue;
        }
        if !seen.insert(nre.clone()) {
            tracing::warn!(index = idx, nre = %nre, "dropping imported student with duplicate nre");
            rejected.push(format!("{}[{}]: duplicate nre {}", key, idx, nre));
            continue;
        }
        student.nre = nre;
        kept.push(student);
    }
    kept
}
