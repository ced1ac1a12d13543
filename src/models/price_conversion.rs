//! Fixed-point conversion between stablecoin payments and DEMI token units.
//!
//! `token_price` is quoted in smallest units of a 6-decimal reference dollar
//! per ONE WHOLE token. The default price of 10_000 therefore reads as $0.01
//! per DEMI, and 1 USDT (1_000_000 units) buys 100 DEMI (100 * 10^18 units).
//!
//! All arithmetic is 256-bit unsigned and truncates toward zero.

use ethers::types::{U256, U512};
use ethers::utils::{format_units, parse_units, ParseUnits};

use crate::models::sale_errors::SaleError;

/// DEMI decimals (smallest unit = 10^-18 DEMI)
pub const TOKEN_DECIMALS: u32 = 18;
/// Decimals of the reference dollar `token_price` is quoted in
pub const PRICE_DECIMALS: u32 = 6;
/// Decimals of both accepted stablecoins
pub const STABLECOIN_DECIMALS: u32 = 6;

fn pow10(exp: u32) -> U256 {
    U256::exp10(exp as usize)
}

/// Exact token amount for `pay_amount`, computed in 512 bits.
///
/// tokens = pay_amount * 10^18 * 10^6 / (token_price * 10^currency_decimals)
///
/// The numerator never overflows, so any `U256` payment has a well-defined
/// token amount, possibly one wider than 256 bits.
pub fn tokens_for_payment_wide(
    pay_amount: U256,
    token_price: U256,
    currency_decimals: u32,
) -> Result<U512, SaleError> {
    if token_price.is_zero() {
        return Err(SaleError::InvalidArgument("token price must be positive".to_string()));
    }

    let numerator = pay_amount.full_mul(pow10(TOKEN_DECIMALS + PRICE_DECIMALS));
    let denominator = token_price
        .checked_mul(pow10(currency_decimals))
        .ok_or(SaleError::ArithmeticOverflow("price scaling"))?;

    Ok(numerator / U512::from(denominator))
}

/// Tokens (smallest units) bought by `pay_amount` smallest units of a currency
/// with `currency_decimals` decimals.
pub fn tokens_for_payment(
    pay_amount: U256,
    token_price: U256,
    currency_decimals: u32,
) -> Result<U256, SaleError> {
    let tokens = tokens_for_payment_wide(pay_amount, token_price, currency_decimals)?;
    U256::try_from(tokens).map_err(|_| SaleError::ArithmeticOverflow("token amount"))
}

/// Smallest currency amount whose purchase yields at least `tokens`.
///
/// Rounds up, so `tokens_for_payment(cost_for_tokens(t)) >= t`.
pub fn cost_for_tokens(
    tokens: U256,
    token_price: U256,
    currency_decimals: u32,
) -> Result<U256, SaleError> {
    if token_price.is_zero() {
        return Err(SaleError::InvalidArgument("token price must be positive".to_string()));
    }

    let numerator = tokens
        .checked_mul(token_price)
        .and_then(|v| v.checked_mul(pow10(currency_decimals)))
        .ok_or(SaleError::ArithmeticOverflow("cost scaling"))?;
    let denominator = pow10(TOKEN_DECIMALS + PRICE_DECIMALS);

    let (quotient, remainder) = numerator.div_mod(denominator);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        quotient.checked_add(U256::one()).ok_or(SaleError::ArithmeticOverflow("cost rounding"))
    }
}

/// Parse a human decimal string ("12.5") into smallest units.
pub fn to_smallest_units(amount: &str, decimals: u32) -> Result<U256, SaleError> {
    let parsed = parse_units(amount, decimals)
        .map_err(|e| SaleError::InvalidArgument(format!("Invalid amount {}: {}", amount, e)))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => {
            Err(SaleError::InvalidArgument(format!("Invalid amount {}: must not be negative", amount)))
        }
    }
}

/// Render smallest units as a decimal string.
pub fn to_display_amount(amount: U256, decimals: u32) -> String {
    // Only fails for decimals > 77, which no DEMI asset uses
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demi(whole: u64) -> U256 {
        U256::from(whole) * U256::exp10(18)
    }

    #[test]
    fn test_one_dollar_buys_one_hundred_tokens() {
        let tokens = tokens_for_payment(U256::from(1_000_000u64), U256::from(10_000u64), 6).unwrap();
        assert_eq!(tokens, demi(100));
    }

    #[test]
    fn test_truncates_sub_unit_remainder() {
        // price 3 units/token: 1 unit buys 1/3 token -> 333..333 smallest units
        let tokens = tokens_for_payment(U256::one(), U256::from(3u64), 6).unwrap();
        assert_eq!(tokens, U256::exp10(18) / U256::from(3u64));
    }

    #[test]
    fn test_currency_with_more_decimals() {
        // 1 dollar expressed in an 18-decimal currency buys the same 100 DEMI
        let tokens = tokens_for_payment(U256::exp10(18), U256::from(10_000u64), 18).unwrap();
        assert_eq!(tokens, demi(100));
    }

    #[test]
    fn test_zero_price_rejected() {
        let err = tokens_for_payment(U256::one(), U256::zero(), 6).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_large_payment_computed_without_overflow() {
        let price = U256::from(10_000u64);
        // 10^60 * 10^24 / 10^10 = 10^74 still fits in 256 bits
        assert_eq!(tokens_for_payment(U256::exp10(60), price, 6).unwrap(), U256::exp10(74));

        let wide = tokens_for_payment_wide(U256::MAX, price, 6).unwrap();
        assert!(wide > U512::from(U256::MAX));
        let err = tokens_for_payment(U256::MAX, price, 6).unwrap_err();
        assert_eq!(err, SaleError::ArithmeticOverflow("token amount"));
    }

    #[test]
    fn test_price_scaling_overflow_detected() {
        let err = tokens_for_payment(U256::one(), U256::MAX, 6).unwrap_err();
        assert_eq!(err, SaleError::ArithmeticOverflow("price scaling"));
    }

    #[test]
    fn test_cost_rounds_up() {
        let price = U256::from(10_000u64);
        assert_eq!(cost_for_tokens(demi(100), price, 6).unwrap(), U256::from(1_000_000u64));
        // one smallest unit of DEMI still costs one smallest unit of USDT
        assert_eq!(cost_for_tokens(U256::one(), price, 6).unwrap(), U256::one());

        let tokens = demi(7) + U256::from(123u64);
        let cost = cost_for_tokens(tokens, price, 6).unwrap();
        assert!(tokens_for_payment(cost, price, 6).unwrap() >= tokens);
    }

    #[test]
    fn test_decimal_string_conversion() {
        assert_eq!(to_smallest_units("10.50", 6).unwrap(), U256::from(10_500_000u64));
        assert!(to_smallest_units("abc", 6).is_err());
        assert!(matches!(to_smallest_units("-1", 6), Err(SaleError::InvalidArgument(_))));
        assert_eq!(to_display_amount(U256::from(10_500_000u64), 6), "10.500000");
    }
}
