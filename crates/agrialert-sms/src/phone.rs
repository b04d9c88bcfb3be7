//! Phone number checks and verification codes.

use rand::Rng;
use subtle::ConstantTimeEq;

/// Digits in a generated verification code
pub const CODE_LENGTH: usize = 6;

/// Accepts an optional leading `+` followed by 4 to 20 ASCII digits.
pub fn validate_phone_number(phone: &str) -> bool {
    let trimmed = phone.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    (4..=20).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Random numeric code of `length` digits (leading zeros allowed)
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}

/// Constant-time comparison of a stored and a submitted code
pub fn codes_match(stored: &str, submitted: &str) -> bool {
    stored.as_bytes().ct_eq(submitted.trim().as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("+15551234567"));
        assert!(validate_phone_number("254700000001"));
        assert!(validate_phone_number(" +1234 "));

        assert!(!validate_phone_number(""));
        assert!(!validate_phone_number("+"));
        assert!(!validate_phone_number("+123"));
        assert!(!validate_phone_number("+1 555 123"));
        assert!(!validate_phone_number("555-1234"));
        assert!(!validate_phone_number("123456789012345678901"));
    }

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..50 {
            let code = generate_code(CODE_LENGTH);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_match() {
        assert!(codes_match("042917", "042917"));
        assert!(codes_match("042917", " 042917\n"));
        assert!(!codes_match("042917", "42917"));
        assert!(!codes_match("042917", "042918"));
        assert!(!codes_match("042917", ""));
    }
}
