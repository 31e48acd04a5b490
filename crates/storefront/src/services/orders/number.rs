//! Human-readable order numbers: `INITIALS-NNNNNN`.

use rand::Rng;

/// Initials used when the name yields none.
const FALLBACK_PREFIX: &str = "ORD";

/// Uppercase first letters of up to the first three words of `name`.
#[must_use]
pub fn initials(name: &str) -> String {
    let prefix: String = name
        .split_whitespace()
        .take(3)
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();

    if prefix.is_empty() {
        FALLBACK_PREFIX.to_owned()
    } else {
        prefix
    }
}

/// A fresh order number for a purchaser called `name`.
#[must_use]
pub fn generate(name: &str) -> String {
    let suffix: u32 = rand::rng().random_range(100_000..=999_999);
    format!("{}-{suffix}", initials(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_of_three_words() {
        assert_eq!(initials("budi santoso wijaya"), "BSW");
    }

    #[test]
    fn test_initials_stop_after_three_words() {
        assert_eq!(initials("Anna Maria Lopez Garcia"), "AML");
    }

    #[test]
    fn test_initials_ignore_extra_whitespace() {
        assert_eq!(initials("  siti   nur "), "SN");
    }

    #[test]
    fn test_initials_fallback() {
        assert_eq!(initials(""), "ORD");
        assert_eq!(initials("   "), "ORD");
        assert_eq!(initials("123 456"), "ORD");
    }

    #[test]
    fn test_generate_shape() {
        let number = generate("Budi Santoso");
        let (prefix, digits) = number.split_once('-').unwrap();
        assert_eq!(prefix, "BS");
        assert_eq!(digits.len(), 6);
        let value: u32 = digits.parse().unwrap();
        assert!((100_000..=999_999).contains(&value));
    }
}
