pub mod codec;
pub mod graph;
pub mod recall;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod tags;
pub mod types;

pub use store::{CapsuleStore, ListFilter};
pub use types::{Capsule, CapsuleType, PhaseOrder, Status};
