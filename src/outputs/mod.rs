//! Output files written alongside the database.
//!
//! - [`json`]: one JSON document per processed event, for inspection and reuse

pub mod json;
