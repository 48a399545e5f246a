//! vmtier-trigger — HTTP trigger for alarm invocations.
//!
//! # Architecture
//!
//! ```text
//! alarm forwarder (POST)
//!   │
//!   ▼
//! hyper server
//!   │
//!   ├── collect request body
//!   ├── InvocationHandler(body) → Reply { status, body }
//!   │
//!   ▼
//! text/plain response (200 or 500)
//! ```

pub mod handler;

pub use handler::{DEFAULT_BODY_LIMIT, HttpTrigger, InvocationHandler, Reply};
