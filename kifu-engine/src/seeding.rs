//! Deterministic round seeding.
//!
//! A session seed is stretched into per-round seeds with SHA-256 and fed to
//! `ChaCha8Rng`. The shuffle is vendored so a wall built from the same
//! `(session, wind, round, honba)` tuple is identical across `rand` releases.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::types::Wind;

/// Unbiased in-place Fisher-Yates shuffle.
pub fn fisher_yates_shuffle<T>(slice: &mut [T], rng: &mut impl Rng) {
    for i in (1..slice.len()).rev() {
        let j = rng.random_range(0..=i);
        slice.swap(i, j);
    }
}

/// `SHA-256(session_seed || wind || round_number || honba_le)`.
pub fn derive_round_seed(session_seed: &[u8; 32], round_wind: Wind, round_number: u8, honba: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(session_seed);
    hasher.update([round_wind as u8, round_number]);
    hasher.update(honba.to_le_bytes());
    hasher.finalize().into()
}

pub fn round_rng(session_seed: &[u8; 32], round_wind: Wind, round_number: u8, honba: u32) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(derive_round_seed(session_seed, round_wind, round_number, honba))
}

/// Expands a `u64` into a session seed.
pub fn session_seed_from_u64(seed: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"kifu-session");
    hasher.update(seed.to_le_bytes());
    hasher.finalize().into()
}
