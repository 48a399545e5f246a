//! vmtier-directory — the VM directory service boundary.
//!
//! # Architecture
//!
//! ```text
//! SessionManager (one per process)
//!   ├── Connector::connect()          → inventory login, then tagging login
//!   └── Session (Arc, shared)
//!       └── Directory
//!           ├── vm_hardware()         → cpu count / memory MB
//!           ├── tags_for_category()   → label taxonomy
//!           ├── attach_tag()
//!           └── logout()              → both sub-sessions
//! ```
//!
//! `VCenterConnector` binds the boundary to the vSphere Automation REST
//! API. `InMemoryDirectory` implements the same traits without a network.

pub mod error;
pub mod memory;
pub mod service;
pub mod session;
pub mod vcenter;

pub use error::{DirectoryError, DirectoryResult};
pub use memory::{Fault, InMemoryDirectory};
pub use service::{Connector, Directory};
pub use session::{Session, SessionManager};
pub use vcenter::VCenterConnector;
