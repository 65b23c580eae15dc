//! Deterministic RNG derivation.
//!
//! Seeds are derived from a namespace and a symbol via BLAKE3, so the same
//! symbol always produces the same stream regardless of which other symbols
//! are generated or in which order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derive a 64-bit seed for `(namespace, symbol)`.
pub fn derive_seed(namespace: &str, symbol: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(&[0]);
    hasher.update(symbol.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Seeded StdRng for `(namespace, symbol)`.
pub fn rng_for(namespace: &str, symbol: &str) -> StdRng {
    StdRng::seed_from_u64(derive_seed(namespace, symbol))
}

/// Standard normal draw via Box-Muller.
pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); shift away from 0 for the log.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
