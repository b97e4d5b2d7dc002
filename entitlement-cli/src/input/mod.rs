//! Spreadsheet input: loading, column validation and typed rows

pub mod loader;
pub mod record;

pub use loader::{Row, load};
pub use record::{FromRecord, Record};
