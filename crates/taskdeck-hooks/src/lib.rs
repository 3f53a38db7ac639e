//! taskdeck-hooks: Job lifecycle event system.
//!
//! Lets callers react to job submissions, skip notices, failures and
//! completions without polling the job store themselves.

pub mod events;
pub mod registry;

pub use events::{JobEvent, JobEventKind};
pub use registry::{HookRegistry, JobEventHandler, handler};
