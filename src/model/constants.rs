/// Reserved pseudo-mint for native SOL, so native transfers flow through the
/// same aggregation path as SPL token transfers.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Ticker used for the fee column. Fees are always paid in native SOL.
pub const SOL_TICKER: &str = "SOL";

/// Smallest-unit precision of native SOL (1 SOL = 10^9 lamports). Also the
/// number of decimal digits every amount is rounded to before emission.
pub const SOL_DECIMALS: u32 = 9;
