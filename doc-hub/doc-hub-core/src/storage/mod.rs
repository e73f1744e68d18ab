//! Tree storage: the document model, the persistence contract and the
//! in-process store.
//!
//! Reads go through a [`TreeSnapshot`], which observes a single consistent
//! state of the tree for as long as it is held. Mutations on a [`TreeStore`]
//! are applied whole or not at all.

use crate::access::{AccessGrant, LinkReach, LinkRole, Role, Subject};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod path;
mod tree;


pub use path::{PathError, TreePath, MAX_SEGMENT, SEGMENT_WIDTH};
pub use tree::DocumentStore;

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub path: TreePath,
    pub depth: u32,
    pub numchild: u32,
    pub link_reach: LinkReach,
    pub link_role: LinkRole,
    pub creator: String,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields supplied when creating a document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub creator: String,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub link_reach: LinkReach,
    #[serde(default)]
    pub link_role: LinkRole,
}

impl NewDocument {
    pub fn new(creator: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            ..Default::default()
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn link(mut self, reach: LinkReach, role: LinkRole) -> Self {
        self.link_reach = reach;
        self.link_role = role;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Tombstone the subtree; paths stay allocated.
    Soft,
    /// Remove the subtree and its grants.
    Hard,
}

/// Offset window over an ordered scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

/// One window of a descendant scan plus the size of the whole scan.
#[derive(Clone, Debug, Default)]
pub struct DescendantPage {
    pub total: usize,
    pub nodes: Vec<Document>,
}

/// Read access to one consistent state of the tree.
#[async_trait]
pub trait TreeSnapshot: Send + Sync {
    /// Point lookup. Tombstoned documents are returned; callers decide.
    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Documents at the given paths, ordered by path. Missing paths are skipped.
    async fn at_paths(&self, paths: &[TreePath]) -> Result<Vec<Document>, StoreError>;

    /// Live documents strictly below `path`, ordered by path, windowed.
    async fn descendants(&self, path: &TreePath, window: Window) -> Result<DescendantPage, StoreError>;

    /// All grants attached to any of the given documents.
    async fn grants_for(&self, ids: &[Uuid]) -> Result<Vec<AccessGrant>, StoreError>;

    /// Root-first chain ending at `path`.
    async fn ancestor_chain(&self, path: &TreePath) -> Result<Vec<Document>, StoreError> {
        self.at_paths(&path.chain()).await
    }
}

/// Persistence collaborator: snapshots for reads, atomic mutations.
#[async_trait]
pub trait TreeStore: Send + Sync {
    async fn snapshot(&self) -> Result<Box<dyn TreeSnapshot>, StoreError>;

    /// Create a document as the last child of `parent`, or as a new root.
    async fn insert(&self, parent: Option<Uuid>, doc: NewDocument) -> Result<Document, StoreError>;

    /// Move a document and its subtree below `new_parent` (or to root level).
    async fn move_node(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Document, StoreError>;

    async fn delete(&self, id: Uuid, mode: DeleteMode) -> Result<(), StoreError>;

    async fn set_link(&self, id: Uuid, reach: LinkReach, role: LinkRole) -> Result<Document, StoreError>;

    /// Grant `role` to `subject` on a document, replacing the subject's existing role there.
    async fn put_grant(&self, document_id: Uuid, subject: Subject, role: Role) -> Result<AccessGrant, StoreError>;

    async fn remove_grant(&self, grant_id: Uuid) -> Result<AccessGrant, StoreError>;
}
