pub mod job;
pub mod markers;
pub mod phase;

pub use job::JobDescriptor;
pub use markers::{DeliveryMarkers, TransitionKind};
pub use phase::{classify, JobPhase};
