//! Key number <-> MML note name

/// Note names of one octave, starting at C
pub const NOTE_NAMES: [&str; 12] = [
    "c", "c+", "d", "d+", "e", "f", "f+", "g", "g+", "a", "a+", "b",
];

/// Semitones per octave
pub const OCTAVE: i32 = 12;

/// Split a MIDI key number into `(octave, note name)`; key 0 is `o0 c`
pub fn key_to_pitch(key: u8) -> (i32, &'static str) {
    let key = key as i32;
    (key / OCTAVE, NOTE_NAMES[(key % OCTAVE) as usize])
}

/// Semitone offset of a note letter within an octave
pub fn letter_offset(letter: char) -> Option<i32> {
    match letter {
        'c' => Some(0),
        'd' => Some(2),
        'e' => Some(4),
        'f' => Some(5),
        'g' => Some(7),
        'a' => Some(9),
        'b' => Some(11),
        _ => None,
    }
}

/// Key number of a note letter with accidental in the given octave.
///
/// The result is not clamped; callers decide what to do with keys outside
/// the MIDI range. `None` for an unknown letter or a key beyond `i32`.
pub fn pitch_to_key(letter: char, accidental: i32, octave: i32) -> Option<i32> {
    OCTAVE
        .checked_mul(octave)?
        .checked_add(letter_offset(letter)?)?
        .checked_add(accidental)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_pitch() {
        assert_eq!(key_to_pitch(0), (0, "c"));
        assert_eq!(key_to_pitch(60), (5, "c"));
        assert_eq!(key_to_pitch(61), (5, "c+"));
        assert_eq!(key_to_pitch(71), (5, "b"));
        assert_eq!(key_to_pitch(127), (10, "g"));
    }

    #[test]
    fn test_pitch_to_key_inverts_key_to_pitch() {
        for key in 0u8..=127 {
            let (octave, name) = key_to_pitch(key);
            let letter = name.chars().next().unwrap();
            let accidental = if name.ends_with('+') { 1 } else { 0 };
            assert_eq!(pitch_to_key(letter, accidental, octave), Some(key as i32));
        }
    }

    #[test]
    fn test_unknown_letter() {
        assert_eq!(pitch_to_key('h', 0, 4), None);
    }

    #[test]
    fn test_extreme_octaves() {
        assert_eq!(pitch_to_key('c', 0, 200_000_000), None);
        assert_eq!(pitch_to_key('c', 0, i32::MIN), None);
        assert_eq!(pitch_to_key('b', i32::MAX, 0), None);
        assert_eq!(pitch_to_key('c', -1, 0), Some(-1));
    }
}
