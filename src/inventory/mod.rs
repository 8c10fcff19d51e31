//! Pure views over the inventory: search, subnet grouping, command presets,
//! CSV import parsing and the dashboard summary.

mod filter;
mod import;
mod presets;
mod summary;

pub use filter::*;
pub use import::*;
pub use presets::*;
pub use summary::*;
