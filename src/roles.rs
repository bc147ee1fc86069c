//! Role assignment matrix: service -> (student -> role).
//!
//! Exclusive ("leader") roles have at most one holder per service. The
//! matrix does not look at a service's finalized flag; callers check it.

use crate::model::{PlanningAssignments, Service, Student};
use serde::Serialize;

/// Selecting this clears the student's role for the service.
pub const UNASSIGNED: &str = "Sin asignar";

pub const DEFAULT_LEADER_ROLES: &[&str] = &["Jefe de Cocina", "2º Jefe de Cocina", "2º Jefe de Takeaway"];

pub const DEFAULT_SECONDARY_ROLES: &[&str] = &[
    "Jefe de Partida",
    "Cocinero",
    "Ayudante",
    "Sin servicio 1",
    "Sin servicio 2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Leader,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RoleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCatalog {
    pub leader_roles: Vec<String>,
    pub secondary_roles: Vec<String>,
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self {
            leader_roles: DEFAULT_LEADER_ROLES.iter().map(|s| s.to_string()).collect(),
            secondary_roles: DEFAULT_SECONDARY_ROLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RoleCatalog {
    pub fn roles(&self) -> Vec<Role> {
        self.leader_roles
            .iter()
            .map(|n| Role {
                name: n.clone(),
                kind: RoleKind::Leader,
            })
            .chain(self.secondary_roles.iter().map(|n| Role {
                name: n.clone(),
                kind: RoleKind::Secondary,
            }))
            .collect()
    }

    pub fn accepts(&self, role_name: &str) -> bool {
        role_name == UNASSIGNED
            || self.leader_roles.iter().any(|r| r == role_name)
            || self.secondary_roles.iter().any(|r| r == role_name)
    }

    /// Options in the order the planning grid offers them.
    pub fn options(&self) -> Vec<String> {
        std::iter::once(UNASSIGNED.to_string())
            .chain(self.leader_roles.iter().cloned())
            .chain(self.secondary_roles.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub previous_role: Option<String>,
    /// Students who lost an exclusive role to this assignment.
    pub revoked: Vec<String>,
}

pub fn assign_role<S: AsRef<str>>(
    assignments: &mut PlanningAssignments,
    service_id: &str,
    student_nre: &str,
    role_name: &str,
    exclusive_role_names: &[S],
) -> RoleChange {
    if role_name == UNASSIGNED {
        let previous_role = assignments
            .get_mut(service_id)
            .and_then(|roles| roles.remove(student_nre));
        return RoleChange {
            previous_role,
            revoked: Vec::new(),
        };
    }

    let service_roles = assignments.entry(service_id.to_string()).or_default();
    let previous_role = service_roles.get(student_nre).cloned();

    let mut revoked = Vec::new();
    if exclusive_role_names.iter().any(|r| r.as_ref() == role_name) {
        service_roles.retain(|nre, role| {
            let other_holder = nre != student_nre && role == role_name;
            if other_holder {
                revoked.push(nre.clone());
            }
            !other_holder
        });
    }

    service_roles.insert(student_nre.to_string(), role_name.to_string());
    RoleChange {
        previous_role,
        revoked,
    }
}

pub fn current_role<'a>(assignments: &'a PlanningAssignments, service_id: &str, nre: &str) -> &'a str {
    assignments
        .get(service_id)
        .and_then(|m| m.get(nre))
        .map(|s| s.as_str())
        .unwrap_or(UNASSIGNED)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridService {
    pub id: String,
    pub name: String,
    pub date: String,
    pub finalized: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub nre: String,
    pub display_name: String,
    /// One entry per grid service, in column order.
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningGrid {
    pub services: Vec<GridService>,
    pub rows: Vec<GridRow>,
    pub options: Vec<String>,
}

pub fn planning_grid(
    students: &[Student],
    services: &[Service],
    assignments: &PlanningAssignments,
    catalog: &RoleCatalog,
) -> PlanningGrid {
    let mut ordered_services = services.to_vec();
    crate::scoring::sort_services_by_date(&mut ordered_services);
    let mut ordered_students: Vec<&Student> = students.iter().collect();
    ordered_students.sort_by_key(|s| s.sort_key());

    let rows = ordered_students
        .into_iter()
        .map(|s| GridRow {
            nre: s.nre.clone(),
            display_name: s.display_name(),
            roles: ordered_services
                .iter()
                .map(|svc| current_role(assignments, &svc.id, &s.nre).to_string())
                .collect(),
        })
        .collect();

    PlanningGrid {
        services: ordered_services
            .iter()
            .map(|s| GridService {
                id: s.id.clone(),
                name: s.name.clone(),
                date: s.date.clone(),
                finalized: s.is_finalized(),
            })
            .collect(),
        rows,
        options: catalog.options(),
    }
}
