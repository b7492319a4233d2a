//! CLI command handlers, one per file.

mod get;
mod info;
mod link;
mod status;

pub use get::run_get;
pub use info::run_info;
pub use link::run_link;
pub use status::run_status;
