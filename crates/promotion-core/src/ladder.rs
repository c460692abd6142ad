//! The academic level ladder.
//!
//! Levels are ranked by their position in a fixed sequence of canonical
//! names, earliest first. The rank is the only input to promotion
//! eligibility.

use tracing::debug;

/// Canonical level names as the backend spells them, earliest first.
pub const LEVEL_LADDER: [&str; 14] = [
    "PREJARDÍN",
    "JARDÍN",
    "TRANSICIÓN",
    "PRIMERO",
    "SEGUNDO",
    "TERCERO",
    "CUARTO",
    "QUINTO",
    "SEXTO",
    "SÉPTIMO",
    "OCTAVO",
    "NOVENO",
    "DÉCIMO",
    "UNDÉCIMO",
];

/// Rank of a level name in [`LEVEL_LADDER`].
///
/// Matching is exact and case-sensitive. Names outside the ladder rank 0,
/// the same as the first level.
pub fn level_order(level_name: &str) -> u32 {
    match LEVEL_LADDER.iter().position(|name| *name == level_name) {
        Some(index) => index as u32,
        None => {
            debug!(level = %level_name, "level not on ladder, ranking as 0");
            0
        }
    }
}

/// `true` when `name` is one of the canonical ladder names.
pub fn is_known_level(level_name: &str) -> bool {
    LEVEL_LADDER.contains(&level_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_follows_ladder_position() {
        for (i, a) in LEVEL_LADDER.iter().enumerate() {
            for (j, b) in LEVEL_LADDER.iter().enumerate() {
                assert_eq!(level_order(a) < level_order(b), i < j, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_known_anchors() {
        assert_eq!(level_order("PREJARDÍN"), 0);
        assert_eq!(level_order("SEGUNDO"), 4);
        assert_eq!(level_order("TERCERO"), 5);
        assert_eq!(level_order("SEXTO"), 8);
        assert_eq!(level_order("UNDÉCIMO"), 13);
    }

    #[test]
    fn test_unknown_and_case_mismatch_rank_zero() {
        assert_eq!(level_order("Segundo"), 0);
        assert_eq!(level_order("DECIMO"), 0);
        assert_eq!(level_order(""), 0);
        assert!(!is_known_level("Segundo"));
        assert!(is_known_level("DÉCIMO"));
    }
}
