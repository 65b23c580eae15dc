//! Trading-session windows by UTC hour.

/// London session, [07:00, 16:00) UTC.
pub const LONDON: (u32, u32) = (7, 16);
/// New York session, [12:00, 21:00) UTC.
pub const NEW_YORK: (u32, u32) = (12, 21);

fn within(hour: u32, (start, end): (u32, u32)) -> bool {
    hour >= start && hour < end
}

/// London or New York open.
pub fn is_prime(hour: u32) -> bool {
    within(hour, LONDON) || within(hour, NEW_YORK)
}

/// London/New York overlap, [12:00, 16:00) UTC.
pub fn is_overlap(hour: u32) -> bool {
    within(hour, LONDON) && within(hour, NEW_YORK)
}

/// Asian session, 22:00 to 07:00 UTC (wraps midnight).
pub fn is_asian(hour: u32) -> bool {
    hour >= 22 || hour < 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prime_covers_seven_to_twenty() {
        let prime: Vec<u32> = (0..24).filter(|&h| is_prime(h)).collect();
        assert_eq!(prime, (7..21).collect::<Vec<_>>());
    }

    #[test]
    fn overlap_is_noon_to_four() {
        let overlap: Vec<u32> = (0..24).filter(|&h| is_overlap(h)).collect();
        assert_eq!(overlap, vec![12, 13, 14, 15]);
    }

    #[test]
    fn asian_wraps_midnight() {
        assert!(is_asian(23));
        assert!(is_asian(0));
        assert!(is_asian(6));
        assert!(!is_asian(7));
        assert!(!is_asian(21));
    }
}
