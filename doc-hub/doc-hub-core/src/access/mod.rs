//! Access model: link settings, roles, grants and the per-node permission
//! computation built on top of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod abilities;
pub mod permission;
pub mod reach;
pub mod resolver;

pub use abilities::{derive_abilities, Abilities, Ability};
pub use permission::{ChainState, ComputedPermission};
pub use reach::{reduce, LinkFold};
pub use resolver::{resolve_user_role, GrantIndex};

/// Who may see a document through its link alone. Ordered from narrowest to widest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkReach {
    #[default]
    Restricted,
    Authenticated,
    Public,
}

/// Capability accompanying a link reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    #[default]
    Reader,
    Editor,
}

/// Privilege scale for explicit grants. Greater roles contain all lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Editor,
    Administrator,
    Owner,
}

impl From<LinkRole> for Role {
    fn from(role: LinkRole) -> Self {
        match role {
            LinkRole::Reader => Role::Reader,
            LinkRole::Editor => Role::Editor,
        }
    }
}

impl LinkReach {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkReach::Restricted => "restricted",
            LinkReach::Authenticated => "authenticated",
            LinkReach::Public => "public",
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Editor => "editor",
            Role::Administrator => "administrator",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for LinkReach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Principal a grant is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    User(String),
    Team(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: Uuid,
    pub document_id: Uuid,
    pub subject: Subject,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The party a permission is computed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { id: String, teams: Vec<String> },
}

impl Viewer {
    pub fn user(id: impl Into<String>) -> Self {
        Viewer::User {
            id: id.into(),
            teams: Vec::new(),
        }
    }

    pub fn with_teams(id: impl Into<String>, teams: Vec<String>) -> Self {
        Viewer::User {
            id: id.into(),
            teams,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Viewer::User { id, .. } => Some(id),
            Viewer::Anonymous => None,
        }
    }

    /// Whether a grant subject designates this viewer.
    pub fn matches(&self, subject: &Subject) -> bool {
        match (self, subject) {
            (Viewer::Anonymous, _) => false,
            (Viewer::User { id, .. }, Subject::User(user)) => id == user,
            (Viewer::User { teams, .. }, Subject::Team(team)) => teams.iter().any(|t| t == team),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_are_ordered() {
        assert!(LinkReach::Restricted < LinkReach::Authenticated);
        assert!(LinkReach::Authenticated < LinkReach::Public);
        assert!(Role::Reader < Role::Editor);
        assert!(Role::Editor < Role::Administrator);
        assert!(Role::Administrator < Role::Owner);
        assert_eq!(Role::from(LinkRole::Editor), Role::Editor);
    }

    #[test]
    fn viewer_matches_user_and_team_subjects() {
        let viewer = Viewer::with_teams("alice", vec!["ops".to_string()]);
        assert!(viewer.matches(&Subject::User("alice".into())));
        assert!(viewer.matches(&Subject::Team("ops".into())));
        assert!(!viewer.matches(&Subject::User("bob".into())));
        assert!(!viewer.matches(&Subject::Team("alice".into())));
        assert!(!Viewer::Anonymous.matches(&Subject::User("alice".into())));
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&LinkReach::Public).unwrap(), "\"public\"");
        assert_eq!(serde_json::to_string(&Role::Administrator).unwrap(), "\"administrator\"");
        assert_eq!(
            serde_json::to_string(&Subject::Team("t".into())).unwrap(),
            "{\"team\":\"t\"}"
        );
    }
}
