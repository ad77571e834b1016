//! Entry id issuance.
use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Millisecond-timestamp ids that never repeat within a session: a tick that
/// would repeat (or run backwards) issues `last + 1` instead.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Next id at `now_millis`, skipping anything in `taken`.
    pub fn next_id(&mut self, now_millis: i64, taken: &HashSet<&str>) -> String {
        let mut candidate = now_millis.max(self.last + 1);
        while taken.contains(candidate.to_string().as_str()) {
            candidate += 1;
        }
        self.last = candidate;
        candidate.to_string()
    }
}

/// Id for a legacy record that was saved without one: timestamp plus a
/// random suffix, so a batch migrated in one tick stays distinct.
pub fn legacy_fallback_id(now_millis: i64, rng: &mut SmallRng) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let suffix: String = (0..9)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    format!("{now_millis}{suffix}")
}

/// Suffix generator seeded from the clock; ids need uniqueness, not secrecy.
#[must_use]
pub fn fallback_rng(now_millis: i64) -> SmallRng {
    SmallRng::seed_from_u64(now_millis.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tick_ids_stay_unique() {
        let mut ids = IdGenerator::new();
        let taken = HashSet::new();
        let a = ids.next_id(1_000, &taken);
        let b = ids.next_id(1_000, &taken);
        let c = ids.next_id(999, &taken);
        assert_eq!(a, "1000");
        assert_eq!(b, "1001");
        assert_eq!(c, "1002");
    }

    #[test]
    fn existing_ids_are_skipped() {
        let mut ids = IdGenerator::new();
        let taken: HashSet<&str> = ["5000", "5001"].into_iter().collect();
        assert_eq!(ids.next_id(5_000, &taken), "5002");
    }

    #[test]
    fn fallback_ids_differ_within_a_tick() {
        let mut rng = fallback_rng(42);
        let a = legacy_fallback_id(42, &mut rng);
        let b = legacy_fallback_id(42, &mut rng);
        assert!(a.starts_with("42"));
        assert_eq!(a.len(), 11);
        assert_ne!(a, b);
    }
}
