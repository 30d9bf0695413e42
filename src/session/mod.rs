mod manager;
mod report;
mod state;

pub(crate) use manager::overlaps;
pub use manager::SessionManager;
pub use report::Report;
pub use state::{Session, SessionState};
