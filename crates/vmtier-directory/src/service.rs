//! The directory service boundary.
//!
//! A [`Connector`] performs the full authentication sequence and hands back
//! a connected [`Directory`]. The directory is shared by every invocation
//! in the process, so implementations must be safe to call concurrently.

use std::sync::Arc;

use async_trait::async_trait;

use vmtier_core::{ConnectionParams, Label, ObjectRef, VmHardware};

use crate::error::DirectoryResult;

/// Opens authenticated connections to the directory service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticate the inventory session, then the tagging session.
    ///
    /// Either both succeed and a connected directory is returned, or an
    /// error is returned and nothing stays logged in.
    async fn connect(&self, params: &ConnectionParams) -> DirectoryResult<Arc<dyn Directory>>;
}

/// An authenticated connection to the directory service.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Current hardware of a VM, or `None` when the record carries no
    /// configuration (deleted, template placeholder, ...).
    async fn vm_hardware(&self, vm: &ObjectRef) -> DirectoryResult<Option<VmHardware>>;

    /// All tags in a category, looked up by category name or id.
    async fn tags_for_category(&self, category: &str) -> DirectoryResult<Vec<Label>>;

    /// Attach an existing tag to an object.
    async fn attach_tag(&self, tag_id: &str, object: &ObjectRef) -> DirectoryResult<()>;

    /// Log out of both sub-sessions.
    async fn logout(&self) -> DirectoryResult<()>;
}
