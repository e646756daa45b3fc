//! Wire types for Helius enhanced transactions.
//!
//! Only the fields the ledger export needs are modeled; everything else in
//! the API response is ignored by ser-de.

use crate::model::constants::SOL_DECIMALS;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTransaction {
    pub signature: String,

    /// Unix seconds.
    pub timestamp: i64,

    /// Lamports.
    #[serde(default)]
    pub fee: u64,

    #[serde(default)]
    pub native_transfers: Vec<NativeTransfer>,

    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,

    /// Lamports.
    pub amount: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,

    /// Pre-scaled decimal amount. Ignored when `raw_token_amount` is present.
    #[serde(default)]
    pub token_amount: Option<Decimal>,

    #[serde(default)]
    pub raw_token_amount: Option<RawTokenAmount>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenAmount {
    /// Smallest-unit amount; `value = token_amount / 10^decimals`.
    pub token_amount: Decimal,

    #[serde(default)]
    pub decimals: u32,
}

impl NativeTransfer {
    /// Lamports converted to whole SOL.
    pub fn sol_amount(&self) -> Decimal {
        lamports_to_sol(self.amount)
    }
}

impl TokenTransfer {
    /// Decimal-adjusted transfer amount. A transfer carrying neither a raw
    /// nor a pre-scaled amount counts as zero.
    pub fn amount(&self) -> Decimal {
        match &self.raw_token_amount {
            Some(raw) => match Decimal::try_new(1, raw.decimals) {
                Ok(scale) => raw.token_amount * scale,
                // Scale exceeds what `Decimal` can represent; the value would
                // underflow to nothing anyway.
                Err(_) => Decimal::ZERO,
            },
            None => self.token_amount.unwrap_or_default(),
        }
    }
}

pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), SOL_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_fields() {
        let tx: EnhancedTransaction = serde_json::from_value(json!({
            "signature": "sig-1",
            "timestamp": 1_700_000_000,
            "fee": 5000,
            "nativeTransfers": [
                { "fromUserAccount": "A", "toUserAccount": "B", "amount": 1_500_000_000_u64 },
            ],
            "tokenTransfers": [
                {
                    "fromUserAccount": "A",
                    "toUserAccount": "B",
                    "mint": "Mint1",
                    "rawTokenAmount": { "tokenAmount": "123456789", "decimals": 6 },
                },
            ],
        }))
        .unwrap();

        assert_eq!(tx.native_transfers[0].sol_amount(), Decimal::new(15, 1));
        assert_eq!(
            tx.token_transfers[0].amount(),
            Decimal::new(123_456_789, 6)
        );
    }

    #[test]
    fn missing_transfer_lists_default_to_empty() {
        let tx: EnhancedTransaction = serde_json::from_value(json!({
            "signature": "sig-1",
            "timestamp": 1_700_000_000,
        }))
        .unwrap();

        assert_eq!(tx.fee, 0);
        assert!(tx.native_transfers.is_empty());
        assert!(tx.token_transfers.is_empty());
    }

    #[test]
    fn prescaled_amount_is_a_fallback() {
        let transfer: TokenTransfer = serde_json::from_value(json!({
            "fromUserAccount": "A",
            "toUserAccount": "B",
            "mint": "Mint1",
            "tokenAmount": 2.5,
        }))
        .unwrap();

        assert_eq!(transfer.amount(), Decimal::new(25, 1));
    }

    #[test]
    fn amount_defaults_to_zero() {
        let transfer: TokenTransfer = serde_json::from_value(json!({
            "fromUserAccount": "A",
            "toUserAccount": "B",
            "mint": "Mint1",
        }))
        .unwrap();

        assert_eq!(transfer.amount(), Decimal::ZERO);
    }
}
