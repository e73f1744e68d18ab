//! Access-checked operations over a tree store.

use crate::access::{Ability, AccessGrant, ComputedPermission, LinkReach, LinkRole, Role, Subject, Viewer};
use crate::config::ServiceConfig;
use crate::error::AccessError;
use crate::identity::Favorites;
use crate::listing::{self, Authorized, DescendantListing, DescendantRecord, PageRequest};
use crate::storage::{DeleteMode, Document, NewDocument, TreeStore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn TreeStore>,
    favorites: Arc<dyn Favorites>,
    config: ServiceConfig,
}

impl DocumentService {
    pub fn new(store: Arc<dyn TreeStore>, favorites: Arc<dyn Favorites>, config: ServiceConfig) -> Self {
        Self {
            store,
            favorites,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Authorize against a snapshot that is released before returning, so
    /// callers may go on to mutate the store.
    async fn check(&self, viewer: &Viewer, id: Uuid, ability: Ability) -> Result<Authorized, AccessError> {
        let snapshot = self.store.snapshot().await?;
        listing::authorize(snapshot.as_ref(), viewer, id, ability, self.config.reveal_missing).await
    }

    pub async fn list_descendants(
        &self,
        viewer: &Viewer,
        id: Uuid,
        request: &PageRequest,
    ) -> Result<DescendantListing, AccessError> {
        let snapshot = self.store.snapshot().await?;
        listing::list_descendants(
            snapshot.as_ref(),
            self.favorites.as_ref(),
            viewer,
            id,
            request,
            &self.config,
        )
        .await
    }

    /// The viewer's computed permission on a document.
    pub async fn permission(&self, viewer: &Viewer, id: Uuid) -> Result<ComputedPermission, AccessError> {
        Ok(self.check(viewer, id, Ability::View).await?.permission)
    }

    /// A single document with the viewer's permission on it.
    pub async fn retrieve(&self, viewer: &Viewer, id: Uuid) -> Result<DescendantRecord, AccessError> {
        let authorized = self.check(viewer, id, Ability::View).await?;
        let is_favorite = self
            .favorites
            .favorites_among(viewer, &[id])
            .await
            .contains(&id);
        Ok(DescendantRecord::new(authorized.target, authorized.permission, is_favorite))
    }

    pub async fn create_document(
        &self,
        viewer: &Viewer,
        parent: Option<Uuid>,
        mut doc: NewDocument,
    ) -> Result<Document, AccessError> {
        let Some(user_id) = viewer.user_id() else {
            return Err(AccessError::Unauthenticated);
        };
        if let Some(parent) = parent {
            self.check(viewer, parent, Ability::UpdateContent).await?;
        }
        doc.creator = user_id.to_string();
        let created = self.store.insert(parent, doc).await?;

        if self.config.grant_creator_owner {
            let owner = Subject::User(user_id.to_string());
            if let Err(err) = self.store.put_grant(created.id, owner, Role::Owner).await {
                warn!(document = %created.id, error = %err, "owner grant failed, removing document");
                if let Err(cleanup) = self.store.delete(created.id, DeleteMode::Hard).await {
                    warn!(document = %created.id, error = %cleanup, "cleanup failed");
                }
                return Err(err.into());
            }
        }
        info!(document = %created.id, path = %created.path, creator = %user_id, "document created");
        Ok(created)
    }

    pub async fn move_document(
        &self,
        viewer: &Viewer,
        id: Uuid,
        new_parent: Option<Uuid>,
    ) -> Result<Document, AccessError> {
        self.check(viewer, id, Ability::ManageAccesses).await?;
        if let Some(parent) = new_parent {
            self.check(viewer, parent, Ability::UpdateContent).await?;
        }
        Ok(self.store.move_node(id, new_parent).await?)
    }

    /// Delete a document and its subtree. A hard delete also purges an
    /// already tombstoned subtree.
    pub async fn delete_document(&self, viewer: &Viewer, id: Uuid, mode: DeleteMode) -> Result<(), AccessError> {
        match mode {
            DeleteMode::Soft => {
                self.check(viewer, id, Ability::Delete).await?;
            }
            DeleteMode::Hard => {
                let snapshot = self.store.snapshot().await?;
                listing::authorize_with_deleted(
                    snapshot.as_ref(),
                    viewer,
                    id,
                    Ability::Delete,
                    self.config.reveal_missing,
                )
                .await?;
            }
        }
        Ok(self.store.delete(id, mode).await?)
    }

    pub async fn update_link_configuration(
        &self,
        viewer: &Viewer,
        id: Uuid,
        reach: LinkReach,
        role: LinkRole,
    ) -> Result<Document, AccessError> {
        self.check(viewer, id, Ability::ManageLinkSettings).await?;
        Ok(self.store.set_link(id, reach, role).await?)
    }

    /// Grant `role` to `subject`. Owner grants can only be handed out by owners.
    pub async fn grant_access(
        &self,
        viewer: &Viewer,
        id: Uuid,
        subject: Subject,
        role: Role,
    ) -> Result<AccessGrant, AccessError> {
        let authorized = self.check(viewer, id, Ability::ManageAccesses).await?;
        if role == Role::Owner && authorized.permission.abilities.role() != Some(Role::Owner) {
            warn!(document = %id, "owner grant refused to non-owner");
            return Err(AccessError::Forbidden);
        }
        Ok(self.store.put_grant(id, subject, role).await?)
    }

    /// Remove a grant attached to `id`. Owner grants can only be removed by owners.
    pub async fn revoke_access(&self, viewer: &Viewer, id: Uuid, grant_id: Uuid) -> Result<AccessGrant, AccessError> {
        let authorized = self.check(viewer, id, Ability::ManageAccesses).await?;
        let grant = authorized
            .grants
            .on(id)
            .iter()
            .find(|grant| grant.id == grant_id)
            .ok_or(AccessError::NotFound)?;
        if grant.role == Role::Owner && authorized.permission.abilities.role() != Some(Role::Owner) {
            return Err(AccessError::Forbidden);
        }
        Ok(self.store.remove_grant(grant_id).await?)
    }
}
