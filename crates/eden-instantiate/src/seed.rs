//! Per-instance RNG seed mixing (§4.4 "Population instance").
//!
//! Mixes at 32-bit granularity: truncate the base seed to its low 32 bits,
//! reverse those bits, XOR with the gid, and reinterpret the result as an
//! `f32` bit pattern (engine-native constants are `f32`, so the mixed seed
//! must fit there).

/// Mix a base seed and a global neuron id into a per-instance RNG seed
/// constant, stored as an `f32` bit pattern in `const_f32`.
pub fn mix_seed(base_seed: u64, gid: u32) -> f32 {
    let truncated = base_seed as u32;
    let reversed = truncated.reverse_bits();
    let mixed = reversed ^ gid;
    f32::from_bits(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_gid_is_deterministic() {
        assert_eq!(mix_seed(42, 7), mix_seed(42, 7));
    }

    #[test]
    fn different_gids_usually_mix_to_different_seeds() {
        assert_ne!(mix_seed(42, 0).to_bits(), mix_seed(42, 1).to_bits());
    }

    #[test]
    fn different_base_seeds_change_the_mix() {
        assert_ne!(mix_seed(1, 5).to_bits(), mix_seed(2, 5).to_bits());
    }

    #[test]
    fn matches_reverse_xor_by_construction() {
        let base = 0xDEAD_BEEFu32;
        let gid = 0x0000_000Fu32;
        let expected = f32::from_bits(base.reverse_bits() ^ gid);
        assert_eq!(mix_seed(base as u64, gid), expected);
    }
}
