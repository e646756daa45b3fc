pub use self::rows::{normalize, ExportCsvRow, LedgerRow};

pub mod constants;
pub mod rows;
pub mod transaction;
