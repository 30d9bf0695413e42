mod discovery;
mod disk_space;
mod topology;
pub(crate) mod validation;
mod walk;

pub(crate) use discovery::is_disk_name;
pub use disk_space::{SpaceProbe, StatvfsProbe};
pub use topology::{Disk, FolderSummary, Topology};
pub(crate) use walk::{walk_tree, WalkedEntry};
