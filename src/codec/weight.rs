//! Row weight sampler.
//!
//! Maps a 20-bit draw onto a soliton-shaped degree distribution. The table is
//! cumulative: bucket `i` covers draws in `[DIST[i - 1], DIST[i])` and yields
//! weight `i`. Weight 2 dominates (about half of all rows), with a long tail
//! reaching 30.

/// Cumulative bucket boundaries over `0..2^20`.
pub const WEIGHT_DIST: [u32; 31] = [
    0, 5243, 529_531, 704_294, 791_675, 844_104, 879_057, 904_023, 922_747, 937_311, 948_962,
    958_494, 966_438, 973_160, 978_921, 983_914, 988_283, 992_138, 995_565, 998_631, 1_001_391,
    1_003_887, 1_006_157, 1_008_229, 1_010_129, 1_011_876, 1_013_490, 1_014_983, 1_016_370,
    1_017_662, 1_048_576,
];

/// Largest weight the table can produce.
pub const MAX_TABLE_WEIGHT: u16 = 30;

const DRAW_MASK: u32 = 0x000f_ffff;

/// Samples a row weight from the low 20 bits of `rv`, clamped to `max_weight`.
///
/// Always returns at least 1, even when `max_weight` is 0.
#[must_use]
pub fn sample_weight(rv: u32, max_weight: u16) -> u16 {
    let rv = rv & DRAW_MASK;
    let mut bucket = 1usize;
    while rv >= WEIGHT_DIST[bucket] {
        bucket += 1;
    }
    (bucket as u16).min(max_weight).max(1)
}
