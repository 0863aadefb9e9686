//! The platform role catalog and role-derived default scopes.

use serde::{Deserialize, Serialize};

/// User roles in the school-operations platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    AdminDos,
    AdminReception,
    AdminStudentOperations,
    AdminSales,
    AdminMarketing,
    AdminAgent,
    Teacher,
    TeacherDos,
    TeacherAssistantDos,
    Student,
    Guest,
}

impl Role {
    /// Default scopes granted when an identity record carries none.
    ///
    /// Guests get no scopes; every other role maps to at least one
    /// wildcard domain grant.
    pub fn default_scopes(&self) -> Vec<String> {
        let scopes: &[&str] = match self {
            Role::SuperAdmin => &[
                "identity:*",
                "finance:*",
                "academic:*",
                "attendance:*",
                "compliance:*",
                "student_services:*",
                "ops:*",
                "quality:*",
                "teacher:*",
                "student:*",
            ],
            Role::Admin => &[
                "finance:*",
                "academic:*",
                "attendance:*",
                "compliance:*",
                "student_services:*",
                "quality:*",
            ],
            Role::AdminDos => &["academic:*", "teacher:*", "quality:*"],
            Role::AdminReception => &["student_services:*", "attendance:*"],
            Role::AdminStudentOperations => &["student_services:*", "compliance:*"],
            Role::AdminSales => &["finance:*"],
            Role::AdminMarketing => &["ops:*"],
            Role::AdminAgent => &["student_services:*"],
            Role::Teacher => &["teacher:*"],
            Role::TeacherDos => &["teacher:*", "academic:*"],
            Role::TeacherAssistantDos => &["teacher:*"],
            Role::Student => &["student:*"],
            Role::Guest => &[],
        };
        scopes.iter().map(|s| (*s).to_string()).collect()
    }

    /// Whether this role is the unauthenticated guest role.
    pub fn is_guest(&self) -> bool {
        matches!(self, Role::Guest)
    }

    /// Short persona line used in model system prompts.
    pub fn persona(&self) -> &'static str {
        match self {
            Role::SuperAdmin | Role::Admin => {
                "You assist a school administrator with full operational oversight."
            }
            Role::AdminDos | Role::TeacherDos | Role::TeacherAssistantDos => {
                "You assist the director of studies with academic planning and teacher management."
            }
            Role::AdminReception | Role::AdminStudentOperations => {
                "You assist front-of-house staff with student services and attendance."
            }
            Role::AdminSales | Role::AdminMarketing | Role::AdminAgent => {
                "You assist the sales and marketing team with enquiries and bookings."
            }
            Role::Teacher => "You assist a teacher with their classes and registers.",
            Role::Student => "You assist a student with their own enrolment and timetable.",
            Role::Guest => "You assist a visitor with general, public information only.",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&Role::AdminStudentOperations).unwrap();
        assert_eq!(json, "\"admin_student_operations\"");
        let parsed: Role = serde_json::from_str("\"teacher_dos\"").unwrap();
        assert_eq!(parsed, Role::TeacherDos);
    }

    #[test]
    fn test_super_admin_covers_all_domains() {
        let scopes = Role::SuperAdmin.default_scopes();
        assert_eq!(scopes.len(), 10);
        assert!(scopes.contains(&"finance:*".to_string()));
        assert!(scopes.contains(&"attendance:*".to_string()));
    }

    #[test]
    fn test_non_guest_roles_have_defaults() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::AdminDos,
            Role::AdminReception,
            Role::AdminStudentOperations,
            Role::AdminSales,
            Role::AdminMarketing,
            Role::AdminAgent,
            Role::Teacher,
            Role::TeacherDos,
            Role::TeacherAssistantDos,
            Role::Student,
        ] {
            assert!(!role.default_scopes().is_empty(), "{role:?} has no defaults");
        }
    }

    #[test]
    fn test_guest_has_no_defaults() {
        assert!(Role::Guest.default_scopes().is_empty());
        assert!(Role::Guest.is_guest());
    }
}
