use crate::model::constants::{SOL_DECIMALS, SOL_MINT, SOL_TICKER};
use crate::model::transaction::{lamports_to_sol, EnhancedTransaction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One classified transfer leg. Native transfers are reinterpreted as legs of
/// the SOL pseudo-mint before they get here.
#[derive(Clone, Debug)]
struct Leg<'a> {
    from: &'a str,
    to: &'a str,
    mint: &'a str,
    amount: Decimal,
}

/// Everything aggregated from one side (sent or received) of a transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Aggregate {
    amount: Decimal,
    mint: String,
    counterparty: String,
}

/// A normalized ledger entry for one transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerRow {
    pub time: DateTime<Utc>,
    pub signature: String,
    pub src: String,
    pub dest: String,
    pub sent_amount: Option<Decimal>,
    pub sent_currency: Option<String>,
    pub received_amount: Option<Decimal>,
    pub received_currency: Option<String>,
    pub fee: Option<Decimal>,
}

/// Normalize one transaction into at most one ledger row.
///
/// Pure function of `(tx, wallet)`: legs are classified as sent or received
/// relative to the wallet (self-transfers and third-party transfers are
/// dropped), each side is aggregated independently, and a row is produced iff
/// at least one leg has the wallet strictly on one side.
pub fn normalize(tx: &EnhancedTransaction, wallet: &str) -> Option<LedgerRow> {
    let mut sent = Vec::new();
    let mut received = Vec::new();

    // Token transfers are classified before native transfers; the "first leg
    // wins" tie-breaks below depend on this ordering.
    for transfer in &tx.token_transfers {
        classify(
            &mut sent,
            &mut received,
            wallet,
            Leg {
                from: &transfer.from_user_account,
                to: &transfer.to_user_account,
                mint: &transfer.mint,
                amount: transfer.amount(),
            },
        );
    }
    for transfer in &tx.native_transfers {
        classify(
            &mut sent,
            &mut received,
            wallet,
            Leg {
                from: &transfer.from_user_account,
                to: &transfer.to_user_account,
                mint: SOL_MINT,
                amount: transfer.sol_amount(),
            },
        );
    }

    // Pure program interactions, self-transfers, third-party traffic.
    if sent.is_empty() && received.is_empty() {
        return None;
    }

    let Some(time) = DateTime::from_timestamp(tx.timestamp, 0) else {
        warn!(
            "Skipping transaction `{signature}` with unrepresentable timestamp {timestamp}",
            signature = tx.signature,
            timestamp = tx.timestamp,
        );
        return None;
    };

    let sent = aggregate(&sent, wallet);
    let received = aggregate(&received, wallet);

    let src = sent
        .as_ref()
        .or(received.as_ref())
        .map(|agg| agg.counterparty.clone())
        .unwrap_or_default();
    let dest = received
        .as_ref()
        .or(sent.as_ref())
        .map(|agg| agg.counterparty.clone())
        .unwrap_or_default();

    let fee = (tx.fee > 0).then(|| lamports_to_sol(tx.fee).round_dp(SOL_DECIMALS).normalize());

    Some(LedgerRow {
        time,
        signature: tx.signature.clone(),
        src,
        dest,
        // A side that rounds to zero leaves the amount cell empty while still
        // naming the currency.
        sent_amount: sent.as_ref().map(|agg| agg.amount).filter(|a| !a.is_zero()),
        sent_currency: sent.map(|agg| agg.mint),
        received_amount: received
            .as_ref()
            .map(|agg| agg.amount)
            .filter(|a| !a.is_zero()),
        received_currency: received.map(|agg| agg.mint),
        fee,
    })
}

fn classify<'a>(sent: &mut Vec<Leg<'a>>, received: &mut Vec<Leg<'a>>, wallet: &str, leg: Leg<'a>) {
    if leg.from == wallet && leg.to != wallet {
        sent.push(leg);
    } else if leg.to == wallet && leg.from != wallet {
        received.push(leg);
    }
}

/// Aggregate one side of a transaction.
///
/// The counterparty is the other account of the *first* leg; amounts
/// accumulate per mint in insertion order and the first mint seen is the one
/// reported. A multi-mint side therefore only reports the first mint's total.
/// This mirrors the upstream export format; see DESIGN.md for the open
/// question on stricter behavior.
fn aggregate(legs: &[Leg<'_>], wallet: &str) -> Option<Aggregate> {
    let first = legs.first()?;
    let counterparty = if first.from != wallet {
        first.from
    } else {
        first.to
    };

    let mut totals: Vec<(&str, Decimal)> = Vec::new();
    for leg in legs {
        match totals.iter_mut().find(|(mint, _)| *mint == leg.mint) {
            Some((_, total)) => *total += leg.amount,
            None => totals.push((leg.mint, leg.amount)),
        }
    }
    let &(mint, total) = totals.first()?;

    Some(Aggregate {
        amount: total.round_dp(SOL_DECIMALS).normalize(),
        mint: mint.to_string(),
        counterparty: counterparty.to_string(),
    })
}

/// CSV surface of [`LedgerRow`], with the fixed column schema. Empty cells
/// serialize as empty strings, never zero.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExportCsvRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "TxHash")]
    pub tx_hash: String,
    #[serde(rename = "TxSrc")]
    pub tx_src: String,
    #[serde(rename = "TxDest")]
    pub tx_dest: String,
    #[serde(rename = "Sent Amount")]
    pub sent_amount: String,
    #[serde(rename = "Sent Currency")]
    pub sent_currency: String,
    #[serde(rename = "Received Amount")]
    pub received_amount: String,
    #[serde(rename = "Received Currency")]
    pub received_currency: String,
    #[serde(rename = "Fee Amount")]
    pub fee_amount: String,
    #[serde(rename = "Fee Currency")]
    pub fee_currency: String,
}

impl ExportCsvRow {
    /// The fixed column schema, in serialization order.
    pub const HEADER: [&'static str; 10] = [
        "Date",
        "TxHash",
        "TxSrc",
        "TxDest",
        "Sent Amount",
        "Sent Currency",
        "Received Amount",
        "Received Currency",
        "Fee Amount",
        "Fee Currency",
    ];
}

impl LedgerRow {
    pub fn to_export_csv(&self) -> ExportCsvRow {
        ExportCsvRow {
            date: self.time.format("%F %T").to_string(),
            tx_hash: self.signature.clone(),
            tx_src: self.src.clone(),
            tx_dest: self.dest.clone(),
            sent_amount: amount_cell(self.sent_amount),
            sent_currency: self.sent_currency.clone().unwrap_or_default(),
            received_amount: amount_cell(self.received_amount),
            received_currency: self.received_currency.clone().unwrap_or_default(),
            fee_amount: amount_cell(self.fee),
            fee_currency: if self.fee.is_some() {
                SOL_TICKER.to_string()
            } else {
                String::new()
            },
        }
    }
}

fn amount_cell(amount: Option<Decimal>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_default()
}
