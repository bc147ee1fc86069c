//! Persisted entities.
//!
//! Field names on the wire match the JSON the dashboard already stores, so a
//! browser storage dump can be imported without reshaping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub attendees: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Positive,
    Negative,
    Neutral,
}

impl AnnotationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

pub const EARLY_DEPARTURE_SUBTYPE: &str = "early_departure";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub date: String,
    pub note: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub nre: String,
    #[serde(default, rename = "expediente")]
    pub record_number: String,
    #[serde(default, rename = "apellido1")]
    pub surname1: String,
    #[serde(default, rename = "apellido2")]
    pub surname2: String,
    #[serde(default, rename = "nombre")]
    pub first_name: String,
    /// Academic group, e.g. "2ºDAW". Not the practice group used in services.
    #[serde(default, rename = "grupo")]
    pub group: String,
    #[serde(default, rename = "subgrupo")]
    pub subgroup: String,
    #[serde(default, rename = "fechaNacimiento")]
    pub birth_date: String,
    #[serde(default, rename = "telefono")]
    pub phone: String,
    #[serde(default, rename = "telefono2")]
    pub phone2: String,
    #[serde(default, rename = "emailPersonal")]
    pub personal_email: String,
    #[serde(default, rename = "emailOficial")]
    pub official_email: String,
    #[serde(default, rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, rename = "entrevistas", skip_serializing_if = "Option::is_none")]
    pub interviews: Option<Vec<Interview>>,
    #[serde(default, rename = "anotaciones", skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

impl Student {
    /// "apellido1 apellido2 nombre", the key rosters are sorted by.
    pub fn sort_key(&self) -> String {
        format!("{} {} {}", self.surname1, self.surname2, self.first_name).to_lowercase()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}, {}", self.surname1, self.surname2, self.first_name)
    }

    pub fn short_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname1)
    }

    pub fn push_annotation(&mut self, annotation: Annotation) {
        self.annotations.get_or_insert_with(Vec::new).push(annotation);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignments {
    #[serde(default, rename = "comedor")]
    pub dining_room: Vec<String>,
    #[serde(default)]
    pub takeaway: Vec<String>,
}

impl GroupAssignments {
    /// Union of both duty lists, deduplicated and sorted.
    pub fn assigned_groups(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .dining_room
            .iter()
            .chain(self.takeaway.iter())
            .cloned()
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub date: String,
    #[serde(default, rename = "trimestre")]
    pub trimester: u8,
    #[serde(default)]
    pub group_assignments: GroupAssignments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized: Option<bool>,
}

impl Service {
    pub fn is_finalized(&self) -> bool {
        self.finalized.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationItemScore {
    pub item_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvaluation {
    pub service_id: String,
    /// Practice group name, e.g. "Grupo 1".
    pub group_id: String,
    #[serde(default)]
    pub scores: Vec<EvaluationItemScore>,
    #[serde(default)]
    pub observation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attendance {
    Present,
    Absent,
}

impl Attendance {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualEvaluation {
    pub service_id: String,
    pub student_nre: String,
    pub attendance: Attendance,
    #[serde(default)]
    pub scores: Vec<EvaluationItemScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationsState {
    #[serde(default)]
    pub group: Vec<GroupEvaluation>,
    #[serde(default)]
    pub individual: Vec<IndividualEvaluation>,
}

impl EvaluationsState {
    pub fn find_group(&self, service_id: &str, group_id: &str) -> Option<&GroupEvaluation> {
        self.group
            .iter()
            .find(|e| e.service_id == service_id && e.group_id == group_id)
    }

    pub fn find_individual(&self, service_id: &str, nre: &str) -> Option<&IndividualEvaluation> {
        self.individual
            .iter()
            .find(|e| e.service_id == service_id && e.student_nre == nre)
    }
}

/// studentNre -> practice group name.
pub type StudentGroupAssignments = BTreeMap<String, String>;

/// serviceId -> (studentNre -> role name).
pub type PlanningAssignments = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExamType {
    T1,
    T2,
    #[serde(rename = "REC")]
    Rec,
}

impl ExamType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "T1" => Some(Self::T1),
            "T2" => Some(Self::T2),
            "REC" => Some(Self::Rec),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::Rec => "REC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticalExamScore {
    pub criterion_id: String,
    pub score: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPracticalExam {
    pub student_nre: String,
    pub exam_type: ExamType,
    #[serde(default)]
    pub scores: Vec<PracticalExamScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalExamGrades {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examen1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examen2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examen3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examen4: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recuperacion: Option<f64>,
}

impl TheoreticalExamGrades {
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "examen1" => self.examen1,
            "examen2" => self.examen2,
            "examen3" => self.examen3,
            "examen4" => self.examen4,
            "recuperacion" => self.recuperacion,
            _ => None,
        }
    }

    /// Returns false for an unknown key.
    pub fn set(&mut self, key: &str, value: Option<f64>) -> bool {
        let slot = match key {
            "examen1" => &mut self.examen1,
            "examen2" => &mut self.examen2,
            "examen3" => &mut self.examen3,
            "examen4" => &mut self.examen4,
            "recuperacion" => &mut self.recuperacion,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// nre -> theory exam grades.
pub type AcademicGrades = BTreeMap<String, TheoreticalExamGrades>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseModuleGrades {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rec: Option<f64>,
}

impl CourseModuleGrades {
    pub fn trimester(&self, n: usize) -> Option<f64> {
        match n {
            1 => self.t1,
            2 => self.t2,
            3 => self.t3,
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: Option<f64>) -> bool {
        let slot = match key {
            "t1" => &mut self.t1,
            "t2" => &mut self.t2,
            "t3" => &mut self.t3,
            "rec" => &mut self.rec,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// nre -> (module key -> grades).
pub type CourseGrades = BTreeMap<String, BTreeMap<String, CourseModuleGrades>>;
