//! OCR confusable-character normalization.

/// Look-alike characters and the digit they stand for.
pub const CONFUSABLES: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('Q', '0'),
    ('D', '0'),
    ('I', '1'),
    ('l', '1'),
    ('S', '5'),
    ('B', '8'),
    ('Z', '2'),
    ('g', '9'),
    ('G', '6'),
];

/// Replace every confusable character with its digit. Other characters are
/// kept as they are.
pub fn normalize_confusables(text: &str) -> String {
    text.chars()
        .map(|c| {
            CONFUSABLES
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}

/// Keep ASCII digits only.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_confusables() {
        assert_eq!(normalize_confusables("OoQD IlSBZ gG"), "0000 11582 96");
        assert_eq!(normalize_confusables("002025-x"), "002025-x");
    }

    #[test]
    fn test_every_confusable_maps_to_a_digit() {
        for (from, to) in CONFUSABLES {
            assert!(!from.is_ascii_digit());
            assert!(to.is_ascii_digit());
        }
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("002025 0501-1601.234567"), "00202505011601234567");
        assert_eq!(digits_only("OIl"), "");
    }
}
