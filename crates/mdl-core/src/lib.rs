pub mod config;
pub mod logging;

pub mod backend;
pub mod model;
pub mod platform;
pub mod reconcile;
pub mod session;
pub mod stream;
