//! Environment abstraction for deterministic testing.
//!
//! Sessions never read the clock or draw entropy themselves. They take `now`
//! as a parameter, and whoever drives them (the session manager, a test, the
//! simulation harness) reads it from an [`Environment`].
//!
//! # Invariants
//!
//! - Monotonicity: `now()` never goes backwards
//! - Determinism: given the same seed, a simulated environment produces the
//!   same `random_bytes()` sequence

use std::time::Instant;

/// Time and randomness provider.
///
/// Implemented by `derec_harness::SimEnv` with a virtual clock and seeded RNG.
/// A production runtime supplies the system clock and OS entropy.
pub trait Environment {
    /// Current time. Never decreases between calls.
    fn now(&self) -> Instant;

    /// Fill `buffer` with random bytes.
    ///
    /// Production implementations MUST use a cryptographically secure source.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fresh AEAD nonce of `N` bytes
    fn random_nonce<const N: usize>(&self) -> [u8; N] {
        let mut nonce = [0u8; N];
        self.random_bytes(&mut nonce);
        nonce
    }

    /// Random byte, used for pairing counters and nonces
    fn random_u8(&self) -> u8 {
        let [byte] = self.random_nonce::<1>();
        byte
    }
}
