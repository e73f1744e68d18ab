use super::{derive_abilities, Abilities, GrantIndex, LinkFold, LinkReach, LinkRole, Role, Viewer};
use crate::storage::Document;
use serde::Serialize;

/// Accumulated state of a root-first chain, reusable by every node below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainState {
    pub link: LinkFold,
    pub user_role: Option<Role>,
    pub grant_count: usize,
}

impl ChainState {
    /// State of the chain extended by `doc`.
    pub fn extend(&self, viewer: &Viewer, doc: &Document, grants: &GrantIndex) -> ChainState {
        ChainState {
            link: self.link.pushed(doc.link_reach, doc.link_role),
            user_role: self.user_role.max(grants.best_role_on(viewer, doc.id)),
            grant_count: self.grant_count + grants.count_on(doc.id),
        }
    }

    /// Fold a whole root-first chain.
    pub fn of_chain(viewer: &Viewer, chain: &[Document], grants: &GrantIndex) -> ChainState {
        chain
            .iter()
            .fold(ChainState::default(), |state, doc| state.extend(viewer, doc, grants))
    }
}

/// Per node and viewer permission snapshot. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComputedPermission {
    pub ancestors_link_reach: LinkReach,
    pub ancestors_link_role: LinkRole,
    pub computed_link_reach: LinkReach,
    pub computed_link_role: LinkRole,
    pub user_role: Option<Role>,
    pub nb_accesses_direct: usize,
    pub nb_accesses_ancestors: usize,
    pub abilities: Abilities,
}

impl ComputedPermission {
    /// Compute the permission of `doc` given the state of its strict ancestors.
    /// Returns the permission and the state to hand down to `doc`'s children.
    pub fn below(
        viewer: &Viewer,
        ancestors: &ChainState,
        doc: &Document,
        grants: &GrantIndex,
    ) -> (Self, ChainState) {
        let full = ancestors.extend(viewer, doc, grants);
        let abilities = derive_abilities(viewer, full.user_role, full.link.role, full.link.reach);
        let permission = Self {
            ancestors_link_reach: ancestors.link.reach,
            ancestors_link_role: ancestors.link.role,
            computed_link_reach: full.link.reach,
            computed_link_role: full.link.role,
            user_role: full.user_role,
            nb_accesses_direct: grants.count_on(doc.id),
            nb_accesses_ancestors: ancestors.grant_count,
            abilities,
        };
        (permission, full)
    }

    /// Compute the permission of the last node of a root-first chain.
    pub fn for_chain(viewer: &Viewer, chain: &[Document], grants: &GrantIndex) -> Option<(Self, ChainState)> {
        let (doc, ancestors) = chain.split_last()?;
        let state = ChainState::of_chain(viewer, ancestors, grants);
        Some(Self::below(viewer, &state, doc, grants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessGrant, Ability, Subject};
    use crate::storage::TreePath;
    use chrono::Utc;
    use uuid::Uuid;

    fn doc(path: &str, reach: LinkReach, role: LinkRole) -> Document {
        let path = TreePath::parse(path).unwrap();
        Document {
            id: Uuid::new_v4(),
            depth: path.depth() as u32,
            path,
            numchild: 0,
            link_reach: reach,
            link_role: role,
            creator: "creator".into(),
            title: None,
            excerpt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn grant(document_id: Uuid, user: &str, role: Role) -> AccessGrant {
        AccessGrant {
            id: Uuid::new_v4(),
            document_id,
            subject: Subject::User(user.into()),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn override_tie_break_for_grandchild() {
        let chain = vec![
            doc("0001", LinkReach::Public, LinkRole::Reader),
            doc("00010001", LinkReach::Public, LinkRole::Editor),
            doc("000100010001", LinkReach::Restricted, LinkRole::Reader),
        ];
        let (perm, _) = ComputedPermission::for_chain(&Viewer::Anonymous, &chain, &GrantIndex::default()).unwrap();
        assert_eq!(perm.ancestors_link_reach, LinkReach::Public);
        assert_eq!(perm.ancestors_link_role, LinkRole::Editor);
        assert_eq!(perm.computed_link_reach, LinkReach::Public);
        assert_eq!(perm.computed_link_role, LinkRole::Editor);
        assert_eq!(perm.user_role, None);
        assert!(perm.abilities.can(Ability::UpdateContent));
    }

    #[test]
    fn counts_split_direct_and_strict_ancestors() {
        let root = doc("0001", LinkReach::Restricted, LinkRole::Reader);
        let child = doc("00010001", LinkReach::Restricted, LinkRole::Reader);
        let grand = doc("000100010001", LinkReach::Restricted, LinkRole::Reader);
        let grants = GrantIndex::new([
            grant(root.id, "u", Role::Reader),
            grant(root.id, "other", Role::Editor),
            grant(child.id, "other2", Role::Reader),
        ]);
        let chain = vec![root, child, grand];
        let viewer = Viewer::user("u");

        let (child_perm, _) = ComputedPermission::for_chain(&viewer, &chain[..2], &grants).unwrap();
        assert_eq!(child_perm.nb_accesses_direct, 1);
        assert_eq!(child_perm.nb_accesses_ancestors, 2);
        assert_eq!(child_perm.user_role, Some(Role::Reader));

        let (grand_perm, state) = ComputedPermission::for_chain(&viewer, &chain, &grants).unwrap();
        assert_eq!(grand_perm.nb_accesses_direct, 0);
        assert_eq!(grand_perm.nb_accesses_ancestors, 3);
        assert_eq!(grand_perm.user_role, Some(Role::Reader));
        assert!(grand_perm.abilities.can(Ability::View));
        assert_eq!(state.grant_count, 3);
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let chain = vec![
            doc("0001", LinkReach::Authenticated, LinkRole::Editor),
            doc("00010001", LinkReach::Restricted, LinkRole::Reader),
            doc("000100010001", LinkReach::Public, LinkRole::Reader),
        ];
        let grants = GrantIndex::new([grant(chain[1].id, "u", Role::Administrator)]);
        let viewer = Viewer::user("u");
        let mut state = ChainState::default();
        let mut last = None;
        for node in &chain {
            let (perm, next) = ComputedPermission::below(&viewer, &state, node, &grants);
            state = next;
            last = Some(perm);
        }
        let (full, _) = ComputedPermission::for_chain(&viewer, &chain, &grants).unwrap();
        assert_eq!(last, Some(full.clone()));
        // and the computation is idempotent
        let (again, _) = ComputedPermission::for_chain(&viewer, &chain, &grants).unwrap();
        assert_eq!(full, again);
        assert_eq!(full.abilities.role(), Some(Role::Administrator));
    }

    #[test]
    fn empty_chain_has_no_permission() {
        assert!(ComputedPermission::for_chain(&Viewer::Anonymous, &[], &GrantIndex::default()).is_none());
    }
}
