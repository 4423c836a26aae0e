//! Correlation tokens

use std::collections::HashSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Opaque 32-bit value tying a sync request to its completion notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncToken(u32);

impl SyncToken {
    pub fn new(value: u32) -> Self {
        SyncToken(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Random token generator that never hands out the same token twice
///
/// Collisions only need to be avoided within one run, so a seedable
/// non-cryptographic generator is enough.
pub struct TokenSource {
    rng: StdRng,
    issued: HashSet<u32>,
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            issued: HashSet::new(),
        }
    }

    /// Reproducible sequence, for replaying a failing run
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    /// Draw a token not issued before by this source
    pub fn next_token(&mut self) -> SyncToken {
        loop {
            let value: u32 = self.rng.gen();
            if self.issued.insert(value) {
                return SyncToken(value);
            }
        }
    }

    /// Whether `token` was drawn from this source
    pub fn was_issued(&self, token: SyncToken) -> bool {
        self.issued.contains(&token.0)
    }

    /// Number of tokens issued so far
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}
