//! Scraping: HTML extraction, single-article fetching and the batch orchestrator.
//!
//! | Module | Role |
//! |--------|------|
//! | [`extract`] | Pure HTML-to-text extraction with a tiered fallback ladder |
//! | [`fetch`] | One URL in, one article (or nothing) out |
//! | [`orchestrator`] | Search, fetch the batch concurrently, find images |

pub mod extract;
pub mod fetch;
pub mod orchestrator;
