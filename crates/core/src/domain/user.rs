use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUPERVISOR: &str = "supervisor";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
}

/// One row of the `user_roles` join table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}

/// The resolved caller of an operation: who they are and which roles they hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(user_id: UserId, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { user_id, roles: roles.into_iter().map(Into::into).collect() }
    }

    pub fn is_supervisor(&self) -> bool {
        actor_has_capability(self, SUPERVISOR)
    }
}

pub fn actor_has_capability(actor: &Actor, capability: &str) -> bool {
    let wanted = normalize_role(capability);
    actor.roles.iter().any(|role| normalize_role(role) == wanted)
}

fn normalize_role(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{actor_has_capability, Actor, UserId, SUPERVISOR};

    #[test]
    fn capability_check_is_case_and_whitespace_insensitive() {
        let actor = Actor::new(UserId(2), [" Supervisor "]);
        assert!(actor_has_capability(&actor, SUPERVISOR));
        assert!(actor.is_supervisor());
    }

    #[test]
    fn actor_without_role_lacks_capability() {
        let actor = Actor::new(UserId(3), ["user", "admin"]);
        assert!(!actor_has_capability(&actor, SUPERVISOR));

        let nobody = Actor::new(UserId(4), Vec::<String>::new());
        assert!(!nobody.is_supervisor());
    }
}
