//! Inherited link reach and role.
//!
//! Reach only widens going down the tree. A node whose reach equals the widest
//! reach seen so far replaces the role, so the closest node wins ties.

use super::{LinkReach, LinkRole};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkFold {
    pub reach: LinkReach,
    pub role: LinkRole,
}

impl Default for LinkFold {
    fn default() -> Self {
        Self {
            reach: LinkReach::Restricted,
            role: LinkRole::Reader,
        }
    }
}

impl LinkFold {
    /// Fold in the next node of a root-first chain.
    pub fn push(&mut self, reach: LinkReach, role: LinkRole) {
        if reach >= self.reach {
            self.reach = reach;
            self.role = role;
        }
    }

    pub fn pushed(mut self, reach: LinkReach, role: LinkRole) -> Self {
        self.push(reach, role);
        self
    }
}

/// Reduce a root-first chain of `(link_reach, link_role)` pairs.
pub fn reduce<I>(chain: I) -> LinkFold
where
    I: IntoIterator<Item = (LinkReach, LinkRole)>,
{
    chain
        .into_iter()
        .fold(LinkFold::default(), |acc, (reach, role)| acc.pushed(reach, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use LinkReach::*;
    use LinkRole::*;

    #[test]
    fn empty_chain_is_restricted_reader() {
        assert_eq!(reduce(Vec::new()), LinkFold::default());
    }

    #[test]
    fn single_node_returns_own_settings() {
        let fold = reduce([(Restricted, Editor)]);
        assert_eq!((fold.reach, fold.role), (Restricted, Editor));
        let fold = reduce([(Authenticated, Reader)]);
        assert_eq!((fold.reach, fold.role), (Authenticated, Reader));
    }

    #[test]
    fn closer_node_wins_on_equal_reach() {
        // root public/reader, child public/editor: the child refines the role
        let fold = reduce([(Public, Reader), (Public, Editor)]);
        assert_eq!((fold.reach, fold.role), (Public, Editor));
        // and a restricted grandchild cannot narrow it
        let fold = reduce([(Public, Reader), (Public, Editor), (Restricted, Reader)]);
        assert_eq!((fold.reach, fold.role), (Public, Editor));
    }

    #[test]
    fn narrower_descendant_keeps_ancestor_role() {
        let fold = reduce([(Public, Editor), (Authenticated, Reader)]);
        assert_eq!((fold.reach, fold.role), (Public, Editor));
    }

    #[test]
    fn wider_descendant_overrides() {
        let fold = reduce([(Authenticated, Editor), (Public, Reader)]);
        assert_eq!((fold.reach, fold.role), (Public, Reader));
    }

    #[test]
    fn adding_a_node_never_lowers_reach() {
        let all = [Restricted, Authenticated, Public];
        for a in all {
            for b in all {
                for c in all {
                    let ancestors = reduce([(a, Reader), (b, Editor)]);
                    let full = reduce([(a, Reader), (b, Editor), (c, Reader)]);
                    assert!(full.reach >= ancestors.reach);
                    assert_eq!(full, ancestors.pushed(c, Reader));
                }
            }
        }
    }
}
