use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary values are exact decimals - never floats. Amounts are kept at a
/// scale of 2 fractional digits, rounded with banker's rounding.
pub type Amount = Decimal;

/// Round an amount to the monetary scale (2 fractional digits, half-even).
pub fn round_money(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Format an amount as a human-readable currency string.
/// Example: 50 -> "50.00", -12.3 -> "-12.30"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", round_money(amount))
}

/// Parse a decimal string into an amount.
/// Example: "50.00" -> 50.00, "12.5" -> 12.50, "100" -> 100.00
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let value: Decimal = input
        .trim()
        .parse()
        .map_err(|_| ParseAmountError::InvalidFormat)?;
    Ok(round_money(value))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(50)), "50.00");
        assert_eq!(format_amount(dec!(12.34)), "12.34");
        assert_eq!(format_amount(dec!(12.3)), "12.30");
        assert_eq!(format_amount(dec!(0.01)), "0.01");
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(-50)), "-50.00");
        assert_eq!(format_amount(dec!(-0.01)), "-0.01");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50.00"), Ok(dec!(50.00)));
        assert_eq!(parse_amount("50"), Ok(dec!(50)));
        assert_eq!(parse_amount("12.34"), Ok(dec!(12.34)));
        assert_eq!(parse_amount("12.5"), Ok(dec!(12.5)));
        assert_eq!(parse_amount(".50"), Ok(dec!(0.50)));
        assert_eq!(parse_amount("-50.00"), Ok(dec!(-50)));
        assert_eq!(parse_amount(" 7.25 "), Ok(dec!(7.25)));
    }

    #[test]
    fn test_parse_amount_rounds_half_even() {
        assert_eq!(parse_amount("12.345"), Ok(dec!(12.34)));
        assert_eq!(parse_amount("12.355"), Ok(dec!(12.36)));
        assert_eq!(parse_amount("100.999"), Ok(dec!(101.00)));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("12.34.56").is_err());
        assert!(parse_amount("").is_err());
    }
}
