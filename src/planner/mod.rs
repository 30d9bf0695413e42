mod builder;
mod types;

pub use builder::{build_plan, PlanRequest};
pub use types::{Conflict, ConflictCopy, ConflictKind, FileEntry, MoveOp, MovePlan};
