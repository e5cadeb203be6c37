use uuid::Uuid;

/// A short numeric booking identifier, always 10 decimal digits.
///
/// Derived from a v4 UUID rather than a counter so ids stay unique across
/// restarts without consulting storage. Callers that need a hard uniqueness
/// guarantee check the live registry and re-draw on collision.
pub fn short_numeric_id() -> String {
    let n = Uuid::new_v4().as_u128() % 10_000_000_000;
    format!("{n:010}")
}
