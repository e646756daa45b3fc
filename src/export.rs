use crate::client::history::{History, HistoryError};
use crate::client::Transport;
use crate::model::{normalize, ExportCsvRow};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Transaction history error")]
    History(#[from] HistoryError),

    #[error("CSV Error")]
    Csv(#[from] csv::Error),

    #[error("I/O Error")]
    Io(#[from] std::io::Error),
}

/// Drain a transaction history into the CSV sink, one normalized row per
/// qualifying transaction. Returns the number of rows written.
///
/// The writer is flushed after every row so an interrupted run never leaves a
/// partially written row behind.
pub fn export<T, W>(history: History<'_, T>, wallet: &str, out: W) -> Result<usize, ExportError>
where
    T: Transport,
    W: Write,
{
    // The header goes out before any row, even when the history yields none,
    // so an uninvolved wallet still produces a well-formed (header-only) CSV.
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(ExportCsvRow::HEADER)?;
    writer.flush()?;

    let mut rows = 0;

    for tx in history {
        let tx = tx?;
        debug!("Processing `{signature}`", signature = tx.signature);

        if let Some(row) = normalize(&tx, wallet) {
            writer.serialize(row.to_export_csv())?;
            writer.flush()?;
            rows += 1;
        }
    }

    info!("Exported {rows} rows for `{wallet}`");

    Ok(rows)
}
