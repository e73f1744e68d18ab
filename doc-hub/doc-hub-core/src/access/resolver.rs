//! Viewer role resolution from explicit grants along an ancestor chain.

use super::{AccessGrant, Role, Viewer};
use std::collections::HashMap;
use uuid::Uuid;

/// Grants of one request, keyed by the document they are attached to.
#[derive(Clone, Debug, Default)]
pub struct GrantIndex {
    by_document: HashMap<Uuid, Vec<AccessGrant>>,
}

impl GrantIndex {
    pub fn new(grants: impl IntoIterator<Item = AccessGrant>) -> Self {
        let mut index = Self::default();
        index.extend(grants);
        index
    }

    pub fn extend(&mut self, grants: impl IntoIterator<Item = AccessGrant>) {
        for grant in grants {
            self.by_document
                .entry(grant.document_id)
                .or_default()
                .push(grant);
        }
    }

    pub fn on(&self, document_id: Uuid) -> &[AccessGrant] {
        self.by_document
            .get(&document_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of grants attached directly to the document.
    pub fn count_on(&self, document_id: Uuid) -> usize {
        self.on(document_id).len()
    }

    /// Strongest role the viewer holds through grants attached to this document alone.
    pub fn best_role_on(&self, viewer: &Viewer, document_id: Uuid) -> Option<Role> {
        if !viewer.is_authenticated() {
            return None;
        }
        self.on(document_id)
            .iter()
            .filter(|grant| viewer.matches(&grant.subject))
            .map(|grant| grant.role)
            .max()
    }
}

/// Effective explicit role of `viewer` on the last node of `chain` (root first).
///
/// Grants anywhere on the chain count with full strength; anonymous viewers
/// never hold a role.
pub fn resolve_user_role(viewer: &Viewer, chain: &[Uuid], grants: &GrantIndex) -> Option<Role> {
    chain
        .iter()
        .filter_map(|id| grants.best_role_on(viewer, *id))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Subject;
    use chrono::Utc;

    fn grant(document_id: Uuid, subject: Subject, role: Role) -> AccessGrant {
        AccessGrant {
            id: Uuid::new_v4(),
            document_id,
            subject,
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_never_gets_a_role() {
        let root = Uuid::new_v4();
        let index = GrantIndex::new([grant(root, Subject::User("u".into()), Role::Owner)]);
        assert_eq!(resolve_user_role(&Viewer::Anonymous, &[root], &index), None);
    }

    #[test]
    fn ancestor_grant_applies_without_decay() {
        let (root, child, grand) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let index = GrantIndex::new([grant(root, Subject::User("u".into()), Role::Editor)]);
        let viewer = Viewer::user("u");
        assert_eq!(resolve_user_role(&viewer, &[root, child, grand], &index), Some(Role::Editor));
        assert_eq!(resolve_user_role(&viewer, &[root], &index), Some(Role::Editor));
    }

    #[test]
    fn strongest_grant_wins_across_chain() {
        let (root, child, grand) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let index = GrantIndex::new([
            grant(root, Subject::User("u".into()), Role::Editor),
            grant(child, Subject::User("u".into()), Role::Owner),
        ]);
        let viewer = Viewer::user("u");
        assert_eq!(resolve_user_role(&viewer, &[root, child, grand], &index), Some(Role::Owner));
        // a sibling branch only sees the root grant
        let sibling = Uuid::new_v4();
        assert_eq!(resolve_user_role(&viewer, &[root, sibling], &index), Some(Role::Editor));
    }

    #[test]
    fn team_grants_match_members_only() {
        let root = Uuid::new_v4();
        let index = GrantIndex::new([grant(root, Subject::Team("ops".into()), Role::Administrator)]);
        let member = Viewer::with_teams("u", vec!["ops".into()]);
        let outsider = Viewer::with_teams("v", vec!["sales".into()]);
        assert_eq!(resolve_user_role(&member, &[root], &index), Some(Role::Administrator));
        assert_eq!(resolve_user_role(&outsider, &[root], &index), None);
    }

    #[test]
    fn counts_ignore_viewer() {
        let root = Uuid::new_v4();
        let index = GrantIndex::new([
            grant(root, Subject::User("a".into()), Role::Reader),
            grant(root, Subject::Team("t".into()), Role::Reader),
        ]);
        assert_eq!(index.count_on(root), 2);
        assert_eq!(index.count_on(Uuid::new_v4()), 0);
    }
}
