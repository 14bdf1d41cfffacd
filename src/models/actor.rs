//! Operator identity and user directory records.
//!
//! Every mutating call receives an explicit [`Actor`]; the engine never reads
//! identity from ambient session state.

use serde::{Deserialize, Serialize};

/// The role an operator acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator.
    Admin,
    /// Team manager; scoped to their own team.
    Manager,
    /// Finance staff.
    Finance,
    /// Floor employee.
    Employee,
}

impl Role {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Finance => "finance",
            Role::Employee => "employee",
        }
    }
}

/// The operator performing a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id of the operator.
    pub id: u64,
    /// Display name of the operator.
    pub name: String,
    /// Role the operator acts under.
    pub role: Role,
    /// The operator's own team, used for manager scoping.
    #[serde(default)]
    pub team: Option<String>,
}

impl Actor {
    /// Creates an actor without a team.
    pub fn new(id: u64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            team: None,
        }
    }

    /// Creates a manager actor scoped to `team`.
    pub fn manager(id: u64, name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Manager,
            team: Some(team.into()),
        }
    }

    /// Whether the actor may act on records belonging to `team`.
    ///
    /// Admin and finance bypass team scoping. A manager with no team on file
    /// is not restricted.
    pub fn can_act_on_team(&self, team: &str) -> bool {
        match self.role {
            Role::Admin | Role::Finance => true,
            Role::Manager => self.team.as_deref().is_none_or(|own| own == team),
            Role::Employee => false,
        }
    }
}

/// A login account, used to route notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Role of the account.
    pub role: Role,
    /// The employee record this account belongs to, if any.
    #[serde(default)]
    pub employee_id: Option<u64>,
    /// The team of the account holder.
    #[serde(default)]
    pub team: Option<String>,
}
