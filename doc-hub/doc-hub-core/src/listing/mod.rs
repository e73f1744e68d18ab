//! Descendant listing.
//!
//! A listing runs against one [`TreeSnapshot`] in fixed phases: authorize the
//! viewer on the target, fetch the page and everything needed to evaluate it
//! with a constant number of batch queries, compute each node's permission
//! from in-memory data, then paginate in path order.

use crate::access::{
    Ability, ChainState, ComputedPermission, GrantIndex, LinkReach, LinkRole, Viewer,
};
use crate::config::ServiceConfig;
use crate::error::{AccessError, StoreError};
use crate::identity::Favorites;
use crate::storage::{Document, TreePath, TreeSnapshot, Window};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

mod cursor;

pub use cursor::Cursor;

/// Pagination parameters of a listing request.
#[derive(Clone, Debug, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DescendantRecord {
    pub id: Uuid,
    pub path: TreePath,
    pub depth: u32,
    pub numchild: u32,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub link_reach: LinkReach,
    pub link_role: LinkRole,
    #[serde(flatten)]
    pub permission: ComputedPermission,
    pub is_favorite: bool,
}

impl DescendantRecord {
    pub(crate) fn new(doc: Document, permission: ComputedPermission, is_favorite: bool) -> Self {
        Self {
            id: doc.id,
            path: doc.path,
            depth: doc.depth,
            numchild: doc.numchild,
            title: doc.title,
            excerpt: doc.excerpt,
            creator: doc.creator,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            link_reach: doc.link_reach,
            link_role: doc.link_role,
            permission,
            is_favorite,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DescendantListing {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<DescendantRecord>,
}

/// Outcome of a successful authorization on a target document.
#[derive(Clone, Debug)]
pub struct Authorized {
    pub target: Document,
    /// Root-first chain, target included.
    pub chain: Vec<Document>,
    /// Grants attached to any node of `chain`.
    pub grants: GrantIndex,
    /// Accumulated state of the full chain.
    pub state: ChainState,
    pub permission: ComputedPermission,
}

fn denial(viewer: &Viewer) -> AccessError {
    if viewer.is_authenticated() {
        AccessError::Forbidden
    } else {
        AccessError::Unauthenticated
    }
}

/// Load the target's chain and grants and check that `viewer` holds `ability` on it.
///
/// The error kind is decided from the loaded chain alone. Tombstoned targets
/// are treated as missing.
pub async fn authorize(
    snapshot: &dyn TreeSnapshot,
    viewer: &Viewer,
    id: Uuid,
    ability: Ability,
    reveal_missing: bool,
) -> Result<Authorized, AccessError> {
    let target = snapshot.get(id).await?.filter(|doc| !doc.is_deleted());
    authorize_target(snapshot, viewer, id, target, ability, reveal_missing).await
}

/// Like [`authorize`], but a tombstoned target is evaluated instead of hidden.
pub async fn authorize_with_deleted(
    snapshot: &dyn TreeSnapshot,
    viewer: &Viewer,
    id: Uuid,
    ability: Ability,
    reveal_missing: bool,
) -> Result<Authorized, AccessError> {
    let target = snapshot.get(id).await?;
    authorize_target(snapshot, viewer, id, target, ability, reveal_missing).await
}

async fn authorize_target(
    snapshot: &dyn TreeSnapshot,
    viewer: &Viewer,
    id: Uuid,
    target: Option<Document>,
    ability: Ability,
    reveal_missing: bool,
) -> Result<Authorized, AccessError> {
    let target = match target {
        Some(doc) => doc,
        None if reveal_missing => return Err(AccessError::NotFound),
        None => return Err(denial(viewer)),
    };
    let chain = snapshot.ancestor_chain(&target.path).await?;
    if chain.len() != target.path.depth() {
        return Err(StoreError::Inconsistent(format!("incomplete ancestor chain for {id}")).into());
    }
    let ids: Vec<Uuid> = chain.iter().map(|doc| doc.id).collect();
    let grants = GrantIndex::new(snapshot.grants_for(&ids).await?);

    let (permission, state) = ComputedPermission::for_chain(viewer, &chain, &grants)
        .ok_or_else(|| StoreError::Inconsistent(format!("empty chain for {id}")))?;
    if !permission.abilities.can(ability) {
        warn!(document = %id, ?ability, authenticated = viewer.is_authenticated(), "access denied");
        return Err(denial(viewer));
    }
    Ok(Authorized {
        target,
        chain,
        grants,
        state,
        permission,
    })
}

/// Ancestors of page nodes lying strictly between `target` and the page.
fn missing_ancestors(target: &TreePath, nodes: &[Document]) -> Vec<TreePath> {
    let on_page: HashSet<&TreePath> = nodes.iter().map(|doc| &doc.path).collect();
    let mut missing = BTreeSet::new();
    for doc in nodes {
        for ancestor in doc.path.ancestors() {
            if ancestor.is_descendant_of(target) && !on_page.contains(&ancestor) {
                missing.insert(ancestor);
            }
        }
    }
    missing.into_iter().collect()
}

fn parent_state<'a>(
    states: &'a HashMap<TreePath, ChainState>,
    doc: &Document,
) -> Result<&'a ChainState, StoreError> {
    doc.path
        .parent()
        .and_then(|parent| states.get(&parent))
        .ok_or_else(|| StoreError::Inconsistent(format!("no parent state for {}", doc.path)))
}

/// List the live descendants of `target`, in path order, one page at a time.
pub async fn list_descendants(
    snapshot: &dyn TreeSnapshot,
    favorites: &dyn Favorites,
    viewer: &Viewer,
    target: Uuid,
    request: &PageRequest,
    config: &ServiceConfig,
) -> Result<DescendantListing, AccessError> {
    let authorized = authorize(snapshot, viewer, target, Ability::View, config.reveal_missing).await?;
    let offset = match request.cursor.as_deref() {
        Some(raw) => Cursor::decode(raw)?.offset,
        None => 0,
    };
    let limit = config.page_size(request.page_size);
    debug!(document = %target, offset, limit, "authorized descendant listing");

    let page = snapshot
        .descendants(&authorized.target.path, Window { offset, limit })
        .await?;
    let missing = missing_ancestors(&authorized.target.path, &page.nodes);
    let intermediates = if missing.is_empty() {
        Vec::new()
    } else {
        snapshot.at_paths(&missing).await?
    };
    let ids: Vec<Uuid> = intermediates
        .iter()
        .chain(page.nodes.iter())
        .map(|doc| doc.id)
        .collect();
    let mut grants = authorized.grants;
    grants.extend(snapshot.grants_for(&ids).await?);
    let page_ids: Vec<Uuid> = page.nodes.iter().map(|doc| doc.id).collect();
    let favorite_ids = favorites.favorites_among(viewer, &page_ids).await;
    debug!(
        total = page.total,
        page = page.nodes.len(),
        intermediates = intermediates.len(),
        "fetched descendant page"
    );

    let mut states: HashMap<TreePath, ChainState> = HashMap::new();
    states.insert(authorized.target.path.clone(), authorized.state);
    for doc in &intermediates {
        let state = parent_state(&states, doc)?.extend(viewer, doc, &grants);
        states.insert(doc.path.clone(), state);
    }

    let mut results = Vec::with_capacity(page.nodes.len());
    for doc in page.nodes {
        let parent = *parent_state(&states, &doc)?;
        let (permission, state) = ComputedPermission::below(viewer, &parent, &doc, &grants);
        states.insert(doc.path.clone(), state);
        let is_favorite = favorite_ids.contains(&doc.id);
        results.push(DescendantRecord::new(doc, permission, is_favorite));
    }

    let end = offset + results.len();
    Ok(DescendantListing {
        count: page.total,
        next: (end < page.total).then(|| Cursor::new(end).encode()),
        previous: (offset > 0).then(|| Cursor::new(offset.saturating_sub(limit)).encode()),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> Document {
        let path = TreePath::parse(path).unwrap();
        Document {
            id: Uuid::new_v4(),
            depth: path.depth() as u32,
            path,
            numchild: 0,
            link_reach: LinkReach::Restricted,
            link_role: LinkRole::Reader,
            creator: "c".into(),
            title: None,
            excerpt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn page_starting_mid_branch_needs_its_ancestors() {
        let target = TreePath::parse("0001").unwrap();
        // page begins at a great-grandchild; its parent and grandparent precede the page
        let page = vec![doc("0001000100010001"), doc("0001000100010002"), doc("00010002")];
        let missing: Vec<String> = missing_ancestors(&target, &page)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(missing, vec!["00010001", "000100010001"]);
    }

    #[test]
    fn page_holding_whole_branches_needs_nothing() {
        let target = TreePath::parse("0001").unwrap();
        let page = vec![doc("00010001"), doc("000100010001"), doc("00010002")];
        assert!(missing_ancestors(&target, &page).is_empty());
    }
}
