//! Coin Random Number Generator
//!
//! Uses Xorshift128+ for fast, well-distributed coin flips.
//! The outcome only has to be unpredictable to clients, so the generator
//! is seeded once per process from wall-clock and UUID entropy hashed
//! through SHA-256. It is not a cryptographic source.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Xorshift128+ PRNG.
///
/// # Example
///
/// ```
/// use coinflip::core::rng::CoinRng;
///
/// let mut a = CoinRng::new(12345);
/// let mut b = CoinRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct CoinRng {
    state: [u64; 2],
}

impl Default for CoinRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl CoinRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG seeded from process-local entropy.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let nonce = uuid::Uuid::new_v4();

        let seed = derive_seed(&[
            &nanos.to_le_bytes(),
            nonce.as_bytes(),
            &std::process::id().to_le_bytes(),
        ]);
        tracing::debug!("coin rng seeded ({})", hex::encode(seed.to_le_bytes()));

        Self::new(seed)
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Fair coin: true and false with equal probability.
    ///
    /// Takes the top bit, which is the strongest bit of Xorshift128+.
    #[inline]
    pub fn next_fair_bool(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Fold arbitrary entropy chunks into a 64-bit seed.
pub fn derive_seed(chunks: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"COINFLIP_SEED_V1");

    for chunk in chunks {
        hasher.update((chunk.len() as u64).to_le_bytes());
        hasher.update(chunk);
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
