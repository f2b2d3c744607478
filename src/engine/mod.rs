pub mod cache;
pub mod index;
pub(crate) mod scanner;
pub mod session;
pub mod update;
pub mod watch;

pub use index::{CloseMatch, Invalidated, ProjectIndex, QueryResult};
pub use session::Session;
pub use update::{check_for_updates, ScanArgs};
pub use watch::watch;
