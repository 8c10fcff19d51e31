//! Database module for NetGuard.
//!
//! Backend record types plus the SQLite store used in local mode.

mod models;
mod store;

pub use models::*;
pub use store::*;
