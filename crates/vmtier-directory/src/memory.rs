//! In-memory directory for tests and offline runs.
//!
//! Holds VM records, a tag taxonomy and an attachment log behind a mutex.
//! Clones share state, so a test can keep a handle for assertions while
//! the session manager owns another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use vmtier_core::{ConnectionParams, Label, ObjectRef, VmHardware};

use crate::error::{DirectoryError, DirectoryResult};
use crate::service::{Connector, Directory};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    InventoryLogin,
    TaggingLogin,
    Retrieve,
    ListTags,
    Attach,
    Logout,
}

#[derive(Default)]
struct Inner {
    vms: HashMap<String, VmHardware>,
    /// Category id → category name.
    categories: HashMap<String, String>,
    labels: Vec<Label>,
    attachments: Vec<(String, ObjectRef)>,
    faults: HashSet<Fault>,
    connect_delay: Option<Duration>,
    connects: usize,
    hardware_lookups: usize,
    category_lookups: usize,
    logouts: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a VM with a hardware configuration.
    ///
    /// Unregistered VMs behave like records without configuration.
    pub fn with_vm(self, id: &str, hardware: VmHardware) -> Self {
        self.lock().vms.insert(id.to_string(), hardware);
        self
    }

    pub fn with_category(self, id: &str, name: &str) -> Self {
        self.lock().categories.insert(id.to_string(), name.to_string());
        self
    }

    /// Add a tag to an already registered category id.
    pub fn with_tag(self, category_id: &str, tag_id: &str, name: &str) -> Self {
        self.lock().labels.push(Label {
            id: tag_id.to_string(),
            name: name.to_string(),
            category_id: category_id.to_string(),
        });
        self
    }

    /// Delay every `connect` call, to widen race windows in tests.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.lock().connect_delay = Some(delay);
        self
    }

    pub fn with_fault(self, fault: Fault) -> Self {
        self.lock().faults.insert(fault);
        self
    }

    pub fn clear_fault(&self, fault: Fault) {
        self.lock().faults.remove(&fault);
    }

    /// Number of authentication sequences started.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn hardware_lookups(&self) -> usize {
        self.lock().hardware_lookups
    }

    pub fn category_lookups(&self) -> usize {
        self.lock().category_lookups
    }

    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }

    /// Every `(tag id, object)` attached so far, in order.
    pub fn attachments(&self) -> Vec<(String, ObjectRef)> {
        self.lock().attachments.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not wedge the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, fault: Fault) -> DirectoryResult<()> {
        if !self.lock().faults.contains(&fault) {
            return Ok(());
        }
        let reason = format!("injected {fault:?} failure");
        Err(match fault {
            Fault::InventoryLogin => DirectoryError::InventoryLogin(reason),
            Fault::TaggingLogin => DirectoryError::TaggingLogin(reason),
            Fault::Logout => DirectoryError::Logout(reason),
            Fault::Retrieve | Fault::ListTags | Fault::Attach => DirectoryError::Rejected(reason),
        })
    }
}

#[async_trait]
impl Connector for InMemoryDirectory {
    async fn connect(&self, params: &ConnectionParams) -> DirectoryResult<Arc<dyn Directory>> {
        let delay = {
            let mut inner = self.lock();
            inner.connects += 1;
            inner.connect_delay
        };
        debug!(server = %params.server, "in-memory connect");

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check(Fault::InventoryLogin)?;
        if let Err(e) = self.check(Fault::TaggingLogin) {
            // Mirror the real connector: release the inventory session.
            self.lock().logouts += 1;
            return Err(e);
        }

        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn vm_hardware(&self, vm: &ObjectRef) -> DirectoryResult<Option<VmHardware>> {
        self.lock().hardware_lookups += 1;
        self.check(Fault::Retrieve)?;
        Ok(self.lock().vms.get(&vm.value).copied())
    }

    async fn tags_for_category(&self, category: &str) -> DirectoryResult<Vec<Label>> {
        self.lock().category_lookups += 1;
        self.check(Fault::ListTags)?;

        let inner = self.lock();
        let category_id = inner
            .categories
            .iter()
            .find(|(id, name)| id.as_str() == category || name.as_str() == category)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| DirectoryError::CategoryNotFound(category.to_string()))?;

        Ok(inner
            .labels
            .iter()
            .filter(|label| label.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn attach_tag(&self, tag_id: &str, object: &ObjectRef) -> DirectoryResult<()> {
        self.check(Fault::Attach)?;

        let mut inner = self.lock();
        if !inner.labels.iter().any(|label| label.id == tag_id) {
            return Err(DirectoryError::Rejected(format!("tag {tag_id} does not exist")));
        }
        inner.attachments.push((tag_id.to_string(), object.clone()));
        Ok(())
    }

    async fn logout(&self) -> DirectoryResult<()> {
        self.lock().logouts += 1;
        self.check(Fault::Logout)
    }
}
