//! Mapping from effective role to permitted actions.

use super::{LinkReach, LinkRole, Role, Viewer};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    View,
    UpdateContent,
    ManageAccesses,
    ManageLinkSettings,
    Delete,
    TransferOwnership,
}

impl Ability {
    /// Weakest role that carries this ability.
    pub fn required_role(self) -> Role {
        match self {
            Ability::View => Role::Reader,
            Ability::UpdateContent => Role::Editor,
            Ability::ManageAccesses | Ability::ManageLinkSettings => Role::Administrator,
            Ability::Delete | Ability::TransferOwnership => Role::Owner,
        }
    }

    pub const ALL: [Ability; 6] = [
        Ability::View,
        Ability::UpdateContent,
        Ability::ManageAccesses,
        Ability::ManageLinkSettings,
        Ability::Delete,
        Ability::TransferOwnership,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Abilities {
    role: Option<Role>,
    set: BTreeSet<Ability>,
}

impl Abilities {
    pub fn for_role(role: Option<Role>) -> Self {
        let set = match role {
            Some(role) => Ability::ALL
                .into_iter()
                .filter(|ability| ability.required_role() <= role)
                .collect(),
            None => BTreeSet::new(),
        };
        Self { role, set }
    }

    /// Effective role the set was derived from.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn can(&self, ability: Ability) -> bool {
        self.set.contains(&ability)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ability> + '_ {
        self.set.iter().copied()
    }
}

impl Serialize for Abilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.set.iter())
    }
}

/// Role implied by the link alone.
pub fn link_floor(viewer: &Viewer, reach: LinkReach, role: LinkRole) -> Option<Role> {
    match reach {
        LinkReach::Public => Some(role.into()),
        LinkReach::Authenticated if viewer.is_authenticated() => Some(role.into()),
        _ => None,
    }
}

pub fn derive_abilities(
    viewer: &Viewer,
    user_role: Option<Role>,
    computed_link_role: LinkRole,
    computed_link_reach: LinkReach,
) -> Abilities {
    let floor = link_floor(viewer, computed_link_reach, computed_link_role);
    Abilities::for_role(user_role.max(floor))
}
