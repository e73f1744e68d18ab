//! Collaborators owned by other services: team membership and favorites.

use crate::access::Viewer;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Resolves the teams a user belongs to.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn teams_of(&self, user_id: &str) -> Vec<String>;
}

/// Fixed membership table.
#[derive(Default)]
pub struct StaticTeams {
    members: HashMap<String, Vec<String>>,
}

impl StaticTeams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, user_id: impl Into<String>, team: impl Into<String>) -> Self {
        self.members.entry(user_id.into()).or_default().push(team.into());
        self
    }
}

#[async_trait]
impl TeamDirectory for StaticTeams {
    async fn teams_of(&self, user_id: &str) -> Vec<String> {
        self.members.get(user_id).cloned().unwrap_or_default()
    }
}

/// Build the viewer for an authenticated user, merging token-supplied teams
/// with the directory's.
pub async fn viewer_for(user_id: String, mut teams: Vec<String>, directory: &dyn TeamDirectory) -> Viewer {
    for team in directory.teams_of(&user_id).await {
        if !teams.contains(&team) {
            teams.push(team);
        }
    }
    Viewer::User { id: user_id, teams }
}

/// Per-viewer favorite flags.
#[async_trait]
pub trait Favorites: Send + Sync {
    /// The subset of `ids` the viewer marked as favorite.
    async fn favorites_among(&self, viewer: &Viewer, ids: &[Uuid]) -> HashSet<Uuid>;
}

/// Favorites kept in memory.
#[derive(Default)]
pub struct MemoryFavorites {
    by_user: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl MemoryFavorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark(&self, user_id: &str, id: Uuid) {
        self.by_user
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(id);
    }

    pub async fn unmark(&self, user_id: &str, id: Uuid) {
        if let Some(set) = self.by_user.write().await.get_mut(user_id) {
            set.remove(&id);
        }
    }
}

#[async_trait]
impl Favorites for MemoryFavorites {
    async fn favorites_among(&self, viewer: &Viewer, ids: &[Uuid]) -> HashSet<Uuid> {
        let Some(user_id) = viewer.user_id() else {
            return HashSet::new();
        };
        let guard = self.by_user.read().await;
        match guard.get(user_id) {
            Some(set) => ids.iter().filter(|id| set.contains(id)).copied().collect(),
            None => HashSet::new(),
        }
    }
}
