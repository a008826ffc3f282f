use rand::Rng;

const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TRACKING_LEN: usize = 10;

/// Opaque shipment tracking code, 10 characters over A-Z and 0-9.
///
/// Random draw with no uniqueness guarantee; collisions are accepted as
/// negligible for tracking numbers.
pub fn generate_tracking_number() -> String {
    let mut rng = rand::thread_rng();
    (0..TRACKING_LEN)
        .map(|_| TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())] as char)
        .collect()
}

/// Numeric-only SKU of the given length. Callers that need uniqueness must
/// check against the catalog and regenerate on collision.
pub fn generate_sku(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
