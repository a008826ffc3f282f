use rust_decimal::Decimal;

/// Apply a percentage discount to a unit price.
///
/// Percentages at or beyond the 0..100 bounds have no effect; the base price
/// is returned unchanged rather than clamped.
pub fn apply_discount(price: Decimal, discount_percent: Decimal) -> Decimal {
    if discount_percent <= Decimal::ZERO || discount_percent >= Decimal::from(100) {
        return price;
    }
    price - price * discount_percent / Decimal::from(100)
}
