use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Hash of an id that does not depend on the toolchain; used to seed
/// per-node randomness. Bytes are written directly so `str`'s own `Hash`
/// impl stays out of the picture.
pub fn stable_u64(s: &str) -> u64 {
    let mut h = FxHasher::default();
    h.write(s.as_bytes());
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_repeats_and_separates() {
        assert_eq!(stable_u64("n1"), stable_u64("n1"));
        assert_ne!(stable_u64("n1"), stable_u64("n2"));
    }
}
