pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod listing;
pub mod service;
pub mod storage;

pub use access::{Ability, ComputedPermission, LinkReach, LinkRole, Role, Subject, Viewer};
pub use config::ServiceConfig;
pub use error::{AccessError, StoreError};
pub use listing::{DescendantListing, DescendantRecord, PageRequest};
pub use service::DocumentService;
pub use storage::{DeleteMode, Document, DocumentStore, NewDocument, TreePath, TreeSnapshot, TreeStore};
