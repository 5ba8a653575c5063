//! Intrinsic value estimation.

/// Benjamin Graham's multiplier: a P/E of 15 times a P/B of 1.5.
const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Graham number `sqrt(22.5 * eps * book_value)`.
///
/// Returns `0.0` when either input is not positive, since the estimate is
/// meaningless for loss-making companies or negative equity.
pub fn graham_value(earnings_per_share: f64, book_value_per_share: f64) -> f64 {
    if earnings_per_share <= 0.0 || book_value_per_share <= 0.0 {
        return 0.0;
    }
    (GRAHAM_MULTIPLIER * earnings_per_share * book_value_per_share).sqrt()
}

/// True when the estimate is above a known, positive market price.
pub fn is_graham_advantageous(graham_value: f64, price: f64) -> bool {
    graham_value > 0.0 && price > 0.0 && graham_value > price
}
