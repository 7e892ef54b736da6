//! MOD 11 check digit used by capture lines

const WEIGHTS: [u32; 3] = [3, 7, 1];

/// Computes the check digit for a run of decimal digits.
///
/// Weights `3, 7, 1` are cycled over the digits, the weighted sum is taken
/// modulo 11 and subtracted from 11. A remainder of zero gives 0, and a
/// result of 10 also collapses to 0 so the output is always one digit.
pub fn mod11_check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b.wrapping_sub(b'0')) * WEIGHTS[i % WEIGHTS.len()])
        .sum();

    let remainder = sum % 11;
    let check = if remainder == 0 { 0 } else { 11 - remainder };

    // 10 cannot be written as a single digit
    if check == 10 { 0 } else { check as u8 }
}

/// Returns true if `digit` is the check digit of `base`.
pub fn verify(base: &str, digit: u8) -> bool {
    mod11_check_digit(base) == digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(mod11_check_digit("09010000193200150000261103"), 5);
        assert_eq!(mod11_check_digit("09010000115000250050261118"), 7);
        assert_eq!(mod11_check_digit("09011234567800150000260212"), 6);
    }

    #[test]
    fn single_digits() {
        // 1 * 3 = 3, 11 - 3 = 8
        assert_eq!(mod11_check_digit("1"), 8);
        // 5 * 3 = 15, 15 % 11 = 4, 11 - 4 = 7
        assert_eq!(mod11_check_digit("5"), 7);
    }

    #[test]
    fn zero_remainder_gives_zero() {
        assert_eq!(mod11_check_digit("0"), 0);
        assert_eq!(mod11_check_digit(&"0".repeat(26)), 0);
        assert_eq!(mod11_check_digit(""), 0);
    }

    #[test]
    fn ten_collapses_to_zero() {
        // 4 * 3 = 12, 12 % 11 = 1, 11 - 1 = 10 -> 0
        assert_eq!(mod11_check_digit("4"), 0);
    }

    #[test]
    fn verify_matches_computation() {
        assert!(verify("09010000193200150000261103", 5));
        assert!(!verify("09010000193200150000261103", 6));
    }
}
