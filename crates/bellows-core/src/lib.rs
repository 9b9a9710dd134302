//! Shared data model for Bellows.
//!
//! Types that cross the wire between the daemon and the client live here:
//! the project model snapshot and the progress event vocabulary. Both
//! sides depend on this crate so the serialized forms stay in lockstep.

pub mod model;
pub mod progress;

pub use model::ProjectModel;
pub use progress::{OperationType, ProgressEvent, TaskResult};

/// Path of the root project in any model tree.
pub const ROOT_PATH: &str = ":";
