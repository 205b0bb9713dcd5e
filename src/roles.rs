//! Roles and the permissions they grant.
//!
//! Roles are strictly ordered; every role holds the permissions of the roles
//! below it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's role within the organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Supervisor,
    Manager,
    Admin,
}

/// An action gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewOwnTasks,
    UpdateOwnTasks,
    CreateTasks,
    AssignTasks,
    ViewTeamTasks,
    ManageProjects,
    ViewReports,
    ManageUsers,
}

const EMPLOYEE: &[Permission] = &[Permission::ViewOwnTasks, Permission::UpdateOwnTasks];
const SUPERVISOR: &[Permission] = &[
    Permission::CreateTasks,
    Permission::AssignTasks,
    Permission::ViewTeamTasks,
];
const MANAGER: &[Permission] = &[Permission::ManageProjects, Permission::ViewReports];
const ADMIN: &[Permission] = &[Permission::ManageUsers];

impl Role {
    /// All roles, lowest first.
    pub fn all() -> [Role; 4] {
        [Role::Employee, Role::Supervisor, Role::Manager, Role::Admin]
    }

    /// Returns the role as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Supervisor => "supervisor",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Parses a role from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "employee" => Some(Self::Employee),
            "supervisor" => Some(Self::Supervisor),
            "manager" => Some(Self::Manager),
            "admin" | "administrator" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Permissions this role adds on top of the roles below it.
    fn granted(&self) -> &'static [Permission] {
        match self {
            Self::Employee => EMPLOYEE,
            Self::Supervisor => SUPERVISOR,
            Self::Manager => MANAGER,
            Self::Admin => ADMIN,
        }
    }

    /// Every permission held by this role.
    pub fn permissions(&self) -> Vec<Permission> {
        Self::all()
            .into_iter()
            .filter(|role| role <= self)
            .flat_map(|role| role.granted().iter().copied())
            .collect()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        Self::all()
            .into_iter()
            .filter(|role| role <= self)
            .any(|role| role.granted().contains(&permission))
    }

    /// Whether a user with this role may assign tasks to a user with `assignee`.
    ///
    /// Assignment goes strictly downwards, except that admins may assign to anyone.
    pub fn can_assign_to(&self, assignee: Role) -> bool {
        if !self.has_permission(Permission::AssignTasks) {
            return false;
        }
        *self == Role::Admin || assignee < *self
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Invalid role: {s}. Expected: employee, supervisor, manager, or admin")
        })
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewOwnTasks => "view_own_tasks",
            Self::UpdateOwnTasks => "update_own_tasks",
            Self::CreateTasks => "create_tasks",
            Self::AssignTasks => "assign_tasks",
            Self::ViewTeamTasks => "view_team_tasks",
            Self::ManageProjects => "manage_projects",
            Self::ViewReports => "view_reports",
            Self::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
