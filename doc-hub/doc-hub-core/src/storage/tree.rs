use super::{
    DeleteMode, DescendantPage, Document, NewDocument, PathError, TreePath, TreeSnapshot, TreeStore,
    Window, MAX_SEGMENT,
};
use crate::access::{AccessGrant, LinkReach, LinkRole, Role, Subject};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

const TREE_FILE: &str = "tree.json";

/// In-memory tree keyed by materialized path.
#[derive(Clone, Debug, Default)]
struct TreeState {
    nodes: BTreeMap<TreePath, Document>,
    paths: HashMap<Uuid, TreePath>,
    grants: HashMap<Uuid, Vec<AccessGrant>>,
}

/// On-disk form of the tree.
#[derive(Serialize, Deserialize)]
struct StoredTree {
    documents: Vec<Document>,
    grants: Vec<AccessGrant>,
}

impl TreeState {
    fn from_stored(stored: StoredTree) -> Self {
        let mut state = Self::default();
        for doc in stored.documents {
            state.paths.insert(doc.id, doc.path.clone());
            state.nodes.insert(doc.path.clone(), doc);
        }
        for grant in stored.grants {
            state.grants.entry(grant.document_id).or_default().push(grant);
        }
        state
    }

    fn to_stored(&self) -> StoredTree {
        StoredTree {
            documents: self.nodes.values().cloned().collect(),
            grants: self.grants.values().flatten().cloned().collect(),
        }
    }

    /// `path` and everything below it, in path order.
    fn subtree(&self, path: &TreePath) -> impl DoubleEndedIterator<Item = (&TreePath, &Document)> + '_ {
        let end = path.subtree_end();
        self.nodes
            .range::<str, _>((Bound::Included(path.as_str()), Bound::Excluded(end.as_str())))
    }

    fn subtree_paths(&self, path: &TreePath) -> Vec<TreePath> {
        self.subtree(path).map(|(p, _)| p.clone()).collect()
    }

    fn live(&self, id: Uuid) -> Result<&Document, StoreError> {
        self.paths
            .get(&id)
            .and_then(|path| self.nodes.get(path))
            .filter(|doc| !doc.is_deleted())
            .ok_or(StoreError::NotFound(id))
    }

    fn next_child_seq(&self, parent: &TreePath) -> Result<u32, StoreError> {
        let level = parent.depth() + 1;
        let last = self
            .subtree(parent)
            .next_back()
            .and_then(|(path, _)| path.segment(level));
        next_seq(last)
    }

    fn next_root_seq(&self) -> Result<u32, StoreError> {
        next_seq(self.nodes.keys().next_back().and_then(|path| path.segment(1)))
    }

    fn adjust_numchild(&mut self, parent: Option<TreePath>, grow: bool) {
        if let Some(doc) = parent.and_then(|path| self.nodes.get_mut(&path)) {
            if grow {
                doc.numchild += 1;
            } else {
                doc.numchild = doc.numchild.saturating_sub(1);
            }
        }
    }

    fn insert(&mut self, parent: Option<Uuid>, new: NewDocument) -> Result<Document, StoreError> {
        let path = match parent {
            Some(pid) => {
                let parent_path = self.live(pid)?.path.clone();
                parent_path.child(self.next_child_seq(&parent_path)?)?
            }
            None => TreePath::root(self.next_root_seq()?)?,
        };
        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4(),
            depth: path.depth() as u32,
            path: path.clone(),
            numchild: 0,
            link_reach: new.link_reach,
            link_role: new.link_role,
            creator: new.creator,
            title: new.title,
            excerpt: new.excerpt,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.adjust_numchild(path.parent(), true);
        self.paths.insert(doc.id, path.clone());
        self.nodes.insert(path, doc.clone());
        Ok(doc)
    }

    fn move_node(&mut self, id: Uuid, new_parent: Option<Uuid>) -> Result<Document, StoreError> {
        let node = self.live(id)?.clone();
        let old_parent = node.path.parent();
        // every check happens before the first write
        let new_path = match new_parent {
            Some(pid) => {
                let target = self.live(pid)?.path.clone();
                if target.is_within(&node.path) {
                    return Err(StoreError::InvalidMove { id, target: pid });
                }
                if old_parent.as_ref() == Some(&target) {
                    return Ok(node);
                }
                target.child(self.next_child_seq(&target)?)?
            }
            None => {
                if old_parent.is_none() {
                    return Ok(node);
                }
                TreePath::root(self.next_root_seq()?)?
            }
        };

        for old in self.subtree_paths(&node.path) {
            if let Some(mut doc) = self.nodes.remove(&old) {
                let path = old.rebase(&node.path, &new_path);
                doc.depth = path.depth() as u32;
                doc.path = path.clone();
                self.paths.insert(doc.id, path.clone());
                self.nodes.insert(path, doc);
            }
        }
        self.adjust_numchild(old_parent, false);
        self.adjust_numchild(new_path.parent(), true);
        self.nodes
            .get(&new_path)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn delete(&mut self, id: Uuid, mode: DeleteMode) -> Result<(), StoreError> {
        let path = self.paths.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let was_live = self.nodes.get(&path).is_some_and(|doc| !doc.is_deleted());
        if mode == DeleteMode::Soft && !was_live {
            return Err(StoreError::NotFound(id));
        }
        let affected = self.subtree_paths(&path);
        match mode {
            DeleteMode::Soft => {
                let now = Utc::now();
                for p in &affected {
                    if let Some(doc) = self.nodes.get_mut(p) {
                        doc.deleted_at.get_or_insert(now);
                    }
                }
            }
            DeleteMode::Hard => {
                for p in &affected {
                    if let Some(doc) = self.nodes.remove(p) {
                        self.paths.remove(&doc.id);
                        self.grants.remove(&doc.id);
                    }
                }
            }
        }
        if was_live {
            self.adjust_numchild(path.parent(), false);
        }
        Ok(())
    }

    fn set_link(&mut self, id: Uuid, reach: LinkReach, role: LinkRole) -> Result<Document, StoreError> {
        let path = self.live(id)?.path.clone();
        let doc = self.nodes.get_mut(&path).ok_or(StoreError::NotFound(id))?;
        doc.link_reach = reach;
        doc.link_role = role;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    fn put_grant(&mut self, document_id: Uuid, subject: Subject, role: Role) -> Result<AccessGrant, StoreError> {
        self.live(document_id)?;
        let grants = self.grants.entry(document_id).or_default();
        if let Some(existing) = grants.iter_mut().find(|g| g.subject == subject) {
            existing.role = role;
            return Ok(existing.clone());
        }
        let grant = AccessGrant {
            id: Uuid::new_v4(),
            document_id,
            subject,
            role,
            created_at: Utc::now(),
        };
        grants.push(grant.clone());
        Ok(grant)
    }

    fn remove_grant(&mut self, grant_id: Uuid) -> Result<AccessGrant, StoreError> {
        for grants in self.grants.values_mut() {
            if let Some(pos) = grants.iter().position(|g| g.id == grant_id) {
                return Ok(grants.remove(pos));
            }
        }
        Err(StoreError::GrantNotFound(grant_id))
    }

    fn get(&self, id: Uuid) -> Option<Document> {
        self.paths.get(&id).and_then(|path| self.nodes.get(path)).cloned()
    }

    fn at_paths(&self, paths: &[TreePath]) -> Vec<Document> {
        let mut out: Vec<Document> = paths
            .iter()
            .filter_map(|path| self.nodes.get(path).cloned())
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out.dedup_by(|a, b| a.id == b.id);
        out
    }

    fn descendants(&self, path: &TreePath, window: Window) -> DescendantPage {
        let mut page = DescendantPage::default();
        for (p, doc) in self.subtree(path) {
            if p == path || doc.is_deleted() {
                continue;
            }
            if page.total >= window.offset && page.nodes.len() < window.limit {
                page.nodes.push(doc.clone());
            }
            page.total += 1;
        }
        page
    }

    fn grants_for(&self, ids: &[Uuid]) -> Vec<AccessGrant> {
        ids.iter()
            .filter_map(|id| self.grants.get(id))
            .flatten()
            .cloned()
            .collect()
    }
}

fn next_seq(last: Option<u32>) -> Result<u32, StoreError> {
    let seq = last.map_or(1, |s| s + 1);
    if seq >= MAX_SEGMENT {
        return Err(PathError::Exhausted.into());
    }
    Ok(seq)
}

fn persist(file: &Path, state: &TreeState) -> Result<(), StoreError> {
    let tmp = file.with_extension("json.tmp");
    let data = serde_json::to_vec(&state.to_stored())?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, file)?;
    Ok(())
}

/// Store keeping the whole tree in memory, optionally mirrored to
/// `tree.json` in a data directory.
///
/// Mutations hold the write lock for their whole duration. With a data
/// directory, a mutation is applied to a copy of the tree which replaces the
/// live one only after it has been written to disk.
#[derive(Clone)]
pub struct DocumentStore {
    state: Arc<RwLock<TreeState>>,
    file: Option<PathBuf>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(TreeState::default())),
            file: None,
        }
    }

    /// Open (or create) a store persisted under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let file = dir.join(TREE_FILE);
        let state = if file.exists() {
            let data = std::fs::read_to_string(&file)?;
            TreeState::from_stored(serde_json::from_str(&data)?)
        } else {
            TreeState::default()
        };
        info!(file = %file.display(), documents = state.nodes.len(), "opened document store");
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            file: Some(file),
        })
    }

    /// File backing the store, if any.
    pub fn data_file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut TreeState) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut guard = self.state.write().await;
        match &self.file {
            None => op(&mut *guard),
            Some(file) => {
                let mut next = guard.clone();
                let out = op(&mut next)?;
                persist(file, &next)?;
                *guard = next;
                Ok(out)
            }
        }
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Read view holding the store's read lock.
struct StateSnapshot(OwnedRwLockReadGuard<TreeState>);

#[async_trait]
impl TreeSnapshot for StateSnapshot {
    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.0.get(id))
    }

    async fn at_paths(&self, paths: &[TreePath]) -> Result<Vec<Document>, StoreError> {
        Ok(self.0.at_paths(paths))
    }

    async fn descendants(&self, path: &TreePath, window: Window) -> Result<DescendantPage, StoreError> {
        Ok(self.0.descendants(path, window))
    }

    async fn grants_for(&self, ids: &[Uuid]) -> Result<Vec<AccessGrant>, StoreError> {
        Ok(self.0.grants_for(ids))
    }
}

#[async_trait]
impl TreeStore for DocumentStore {
    async fn snapshot(&self) -> Result<Box<dyn TreeSnapshot>, StoreError> {
        let guard = self.state.clone().read_owned().await;
        debug!(documents = guard.nodes.len(), "opened tree snapshot");
        Ok(Box::new(StateSnapshot(guard)))
    }

    async fn insert(&self, parent: Option<Uuid>, doc: NewDocument) -> Result<Document, StoreError> {
        let doc = self.mutate(move |state| state.insert(parent, doc)).await?;
        info!(id = %doc.id, path = %doc.path, "document inserted");
        Ok(doc)
    }

    async fn move_node(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Document, StoreError> {
        let doc = self.mutate(move |state| state.move_node(id, new_parent)).await?;
        info!(id = %id, path = %doc.path, "document moved");
        Ok(doc)
    }

    async fn delete(&self, id: Uuid, mode: DeleteMode) -> Result<(), StoreError> {
        self.mutate(move |state| state.delete(id, mode)).await?;
        info!(id = %id, ?mode, "document deleted");
        Ok(())
    }

    async fn set_link(&self, id: Uuid, reach: LinkReach, role: LinkRole) -> Result<Document, StoreError> {
        let doc = self.mutate(move |state| state.set_link(id, reach, role)).await?;
        info!(id = %id, reach = %reach, "link configuration updated");
        Ok(doc)
    }

    async fn put_grant(&self, document_id: Uuid, subject: Subject, role: Role) -> Result<AccessGrant, StoreError> {
        let grant = self
            .mutate(move |state| state.put_grant(document_id, subject, role))
            .await?;
        info!(document = %document_id, grant = %grant.id, role = %role, "access granted");
        Ok(grant)
    }

    async fn remove_grant(&self, grant_id: Uuid) -> Result<AccessGrant, StoreError> {
        let grant = self.mutate(move |state| state.remove_grant(grant_id)).await?;
        info!(document = %grant.document_id, grant = %grant_id, "access revoked");
        Ok(grant)
    }
}
