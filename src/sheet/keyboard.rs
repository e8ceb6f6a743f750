use serde::Serialize;

/// The 15 playable keys, three rows of five, in row-major order. The
/// derived `Ord` is the keyboard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Key {
    A1,
    A2,
    A3,
    A4,
    A5,
    B1,
    B2,
    B3,
    B4,
    B5,
    C1,
    C2,
    C3,
    C4,
    C5,
}

pub const KEY_COUNT: usize = 15;

/// All keys in keyboard order.
pub const ALL_KEYS: [Key; KEY_COUNT] = [
    Key::A1,
    Key::A2,
    Key::A3,
    Key::A4,
    Key::A5,
    Key::B1,
    Key::B2,
    Key::B3,
    Key::B4,
    Key::B5,
    Key::C1,
    Key::C2,
    Key::C3,
    Key::C4,
    Key::C5,
];

impl Key {
    /// Center frequency in Hz (equal-tempered whole-tone steps, C4..E6).
    pub fn frequency(self) -> f32 {
        match self {
            Key::A1 => 261.63,  // C4
            Key::A2 => 293.66,  // D4
            Key::A3 => 329.63,  // E4
            Key::A4 => 369.99,  // F#4
            Key::A5 => 415.30,  // G#4
            Key::B1 => 466.16,  // A#4
            Key::B2 => 523.25,  // C5
            Key::B3 => 587.33,  // D5
            Key::B4 => 659.25,  // E5
            Key::B5 => 739.99,  // F#5
            Key::C1 => 830.61,  // G#5
            Key::C2 => 932.33,  // A#5
            Key::C3 => 1046.50, // C6
            Key::C4 => 1174.66, // D6
            Key::C5 => 1318.51, // E6
        }
    }

    /// The sheet-format symbol, e.g. `"B3"`.
    pub fn symbol(self) -> &'static str {
        match self {
            Key::A1 => "A1",
            Key::A2 => "A2",
            Key::A3 => "A3",
            Key::A4 => "A4",
            Key::A5 => "A5",
            Key::B1 => "B1",
            Key::B2 => "B2",
            Key::B3 => "B3",
            Key::B4 => "B4",
            Key::B5 => "B5",
            Key::C1 => "C1",
            Key::C2 => "C2",
            Key::C3 => "C3",
            Key::C4 => "C4",
            Key::C5 => "C5",
        }
    }
}

/// Nearest key to `freq` by log-frequency distance, with that distance in
/// cents. Scans in keyboard order with a strict comparison, so an exact tie
/// between two neighbors always resolves to the lower-indexed key.
pub fn nearest_key(freq: f32) -> (Key, f32) {
    let mut best = ALL_KEYS[0];
    let mut best_cents = f32::INFINITY;
    for key in ALL_KEYS {
        let cents = 1200.0 * (freq / key.frequency()).log2().abs();
        if cents < best_cents {
            best = key;
            best_cents = cents;
        }
    }
    (best, best_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_strictly_ascending() {
        for pair in ALL_KEYS.windows(2) {
            assert!(pair[0].frequency() < pair[1].frequency());
        }
    }

    #[test]
    fn ord_matches_keyboard_order() {
        for pair in ALL_KEYS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn center_frequencies_map_to_their_own_key() {
        for key in ALL_KEYS {
            let (nearest, cents) = nearest_key(key.frequency());
            assert_eq!(nearest, key);
            assert!(cents < 1e-3);
        }
    }

    #[test]
    fn boundary_splits_at_the_geometric_midpoint() {
        // The geometric mean is equidistant in log-frequency space; just
        // below it the lower key wins, just above it the upper key wins.
        for pair in ALL_KEYS.windows(2) {
            let midpoint = (pair[0].frequency() * pair[1].frequency()).sqrt();
            assert_eq!(nearest_key(midpoint * 0.999).0, pair[0]);
            assert_eq!(nearest_key(midpoint * 1.001).0, pair[1]);
        }
    }

    #[test]
    fn midpoint_itself_resolves_to_the_lower_key() {
        // Equidistant up to rounding; the scan only replaces its best key
        // on a strictly smaller distance, so the lower key stays.
        let midpoint = (Key::A1.frequency() * Key::A2.frequency()).sqrt();
        assert_eq!(nearest_key(midpoint).0, Key::A1);
    }

    #[test]
    fn degenerate_input_falls_back_to_the_first_key() {
        // Zero is infinitely far from every key; the strict-less scan keeps
        // the first key and an infinite distance, which the tolerance gate
        // upstream rejects.
        let (key, cents) = nearest_key(0.0);
        assert_eq!(key, Key::A1);
        assert!(cents.is_infinite());
    }

    #[test]
    fn keys_serialize_as_their_symbol() {
        for key in ALL_KEYS {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.symbol()));
        }
    }
}
