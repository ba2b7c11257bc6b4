pub mod builder;
pub mod priority;
pub mod queue;
pub mod staleness;

pub use builder::{Freshness, QueueBuilder};
pub use queue::{Operation, WorkItem, WorkQueue};
pub use staleness::StalenessPolicy;
