//! All of the crate's error types, gathered in one place.

pub use crate::client::history::HistoryError;
pub use crate::client::FetchError;
pub use crate::export::ExportError;
