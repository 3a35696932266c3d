//! Coin-toss termination logic
//!
//! Both coin policies share one primitive: an independent toss with
//! success probability `1/k`, drawn from the node's own seeded RNG so a
//! whole simulation stays reproducible. `k = 1` always succeeds, which
//! makes removal deterministic; `k = 0` never succeeds, which makes a
//! gossip node propagate exactly like an anti-entropy one.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// A `1/k` coin owned by one node.
#[derive(Debug)]
pub struct CoinToss {
    k: u32,
    rng: Pcg64,
}

impl CoinToss {
    /// Create a coin with inverse success probability `k`.
    pub fn new(k: u32, seed: u64) -> Self {
        Self {
            k,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// The `k` this coin was built with.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Toss once: `true` with probability `1/k`.
    pub fn toss(&mut self) -> bool {
        match self.k {
            0 => false,
            1 => true,
            k => self.rng.gen_range(0..k) == 0,
        }
    }
}
