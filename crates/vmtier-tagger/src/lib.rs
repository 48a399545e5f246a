//! vmtier-tagger — turn a red CPU/memory alarm into a next-tier tag.
//!
//! [`TaggingOrchestrator`] drives one invocation through validation,
//! classification, session acquisition, hardware fetch, tier computation,
//! tag resolution and attachment. The [`fetcher`] and [`resolver`] modules
//! wrap the two directory reads.

pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod resolver;

pub use error::{FetchError, TaggingError, TaggingResult};
pub use orchestrator::{InvocationResponse, Outcome, TaggingOrchestrator, STATUS_INTERNAL_ERROR, STATUS_OK};
pub use resolver::ResolvedTag;
