// Public fallible APIs in this crate share one concrete error contract (`MarkbookError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub(crate) mod cache;
pub mod client;
pub mod error;
pub mod index;
pub(crate) mod jsonl;
pub mod marker;
pub mod models;
pub mod normalize;
pub mod store;
pub mod whitelist;

pub use client::Markbook;
pub use error::{MarkbookError, Result};
pub use normalize::normalize_label;
pub use store::AssignmentStore;
