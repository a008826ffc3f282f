use rust_decimal::Decimal;

use marketplace_api::codes::{generate_sku, generate_tracking_number};
use marketplace_api::pricing::apply_discount;

#[test]
fn discount_boundaries_are_no_ops() {
    let price = Decimal::from(100);
    assert_eq!(apply_discount(price, Decimal::from(0)), price);
    assert_eq!(apply_discount(price, Decimal::from(100)), price);
    assert_eq!(apply_discount(price, Decimal::from(-5)), price);
    assert_eq!(apply_discount(price, Decimal::from(150)), price);
}

#[test]
fn discount_applies_within_bounds() {
    assert_eq!(
        apply_discount(Decimal::from(100), Decimal::from(50)),
        Decimal::from(50)
    );
    assert_eq!(
        apply_discount(Decimal::from(200), Decimal::from(25)),
        Decimal::from(150)
    );
}

#[test]
fn discount_is_exact_on_fractional_prices() {
    // 19.99 at 10% off: no float drift allowed.
    let price = Decimal::new(1999, 2);
    let expected = Decimal::new(17991, 3);
    assert_eq!(apply_discount(price, Decimal::from(10)), expected);
}

#[test]
fn tracking_number_shape() {
    for _ in 0..50 {
        let code = generate_tracking_number();
        assert_eq!(code.len(), 10);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "unexpected character in {code}"
        );
    }
}

#[test]
fn sku_is_numeric_with_requested_length() {
    for len in [4, 8, 12] {
        let sku = generate_sku(len);
        assert_eq!(sku.len(), len);
        assert!(sku.chars().all(|c| c.is_ascii_digit()));
    }
}
