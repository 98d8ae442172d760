// src/gestures.rs
//! Turkish Sign Language fingerspelling alphabet.
//!
//! Class identifiers are assigned alphabetically over the 29-letter Turkish
//! alphabet (Q, W and X are absent; Ç, Ğ, İ, Ö, Ş and Ü are included). Model
//! training and the runtime share this ordering, so a classifier output maps
//! directly into [`label`].

use crate::config::constants::capacity;

/// Number of gesture classes in the fingerspelling alphabet.
pub const GESTURE_CLASSES: usize = capacity::MAX_CLASSES;

const LABELS: [&str; GESTURE_CLASSES] = [
    "A", "B", "C", "Ç", "D", "E", "F", "G", "Ğ", "H", "I", "İ", "J", "K", "L", "M", "N", "O", "Ö",
    "P", "R", "S", "Ş", "T", "U", "Ü", "V", "Y", "Z",
];

/// Letter for a gesture class, or `None` when the class is out of range.
pub fn label(class: u8) -> Option<&'static str> {
    LABELS.get(class as usize).copied()
}

/// Class identifier for a letter, matching case-sensitively.
pub fn class_of(letter: &str) -> Option<u8> {
    LABELS.iter().position(|&l| l == letter).map(|idx| idx as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_bounds() {
        assert_eq!(label(0), Some("A"));
        assert_eq!(label(28), Some("Z"));
        assert_eq!(label(29), None);
        assert_eq!(label(u8::MAX), None);
    }

    #[test]
    fn test_dotted_and_dotless_i_are_distinct() {
        assert_eq!(label(10), Some("I"));
        assert_eq!(label(11), Some("İ"));
        assert_ne!(class_of("I"), class_of("İ"));
    }

    #[test]
    fn test_class_of_inverts_label() {
        for class in 0..GESTURE_CLASSES as u8 {
            let letter = label(class).unwrap();
            assert_eq!(class_of(letter), Some(class));
        }
        assert_eq!(class_of("Q"), None);
    }
}
