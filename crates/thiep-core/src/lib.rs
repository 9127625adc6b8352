//! Card composition, addressing and two-party chat over pluggable
//! directory, identity and notification collaborators.

pub mod config;
pub mod draft;
pub mod error;
pub mod identity;
pub mod links;
pub mod listing;
pub mod mode;
pub mod ports;
pub mod relay;
pub mod resolver;
pub mod send;
pub mod session;
pub mod store;
#[cfg(test)]
mod testing;
pub mod thread;

pub use error::{AppError, Notice, NoticeLevel};
