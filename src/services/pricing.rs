// src/services/pricing.rs

use rust_decimal::Decimal;

use crate::models::subscription::RegistrationQuote;

const REGISTRATION_BASE_PRICE: i64 = 500;
// 15%, as (mantissa, scale).
const TAX_RATE: (i64, u32) = (15, 2);

/// Flat registration fee; the building details do not change it.
pub fn registration_quote() -> RegistrationQuote {
    let base_price = Decimal::from(REGISTRATION_BASE_PRICE);
    let tax_rate = Decimal::new(TAX_RATE.0, TAX_RATE.1);
    let tax = (base_price * tax_rate).round_dp(2);

    RegistrationQuote {
        base_price,
        tax,
        total_price: base_price + tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_adds_fifteen_percent_tax() {
        let quote = registration_quote();
        assert_eq!(quote.base_price, Decimal::from(500));
        assert_eq!(quote.tax, Decimal::new(7500, 2));
        assert_eq!(quote.total_price, Decimal::new(57500, 2));
    }
}
