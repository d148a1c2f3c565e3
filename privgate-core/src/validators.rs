// File: privgate-core/src/validators.rs
//! Programmatic validation functions for specific sensitive data types.
//!
//! This module provides additional validation logic beyond regular expression
//! matching for categories where structural checks cut down false positives:
//! US Social Security Numbers and payment card numbers. Detectors opt in via
//! the `programmatic_validation` flag in their configuration.
//!
//! License: MIT OR Apache-2.0

use crate::detection::PatternCategory;

/// Dispatches a matched excerpt to the validator for its category.
///
/// Categories without a structural check always validate.
pub fn validate(category: PatternCategory, matched: &str) -> bool {
    match category {
        PatternCategory::Ssn => is_valid_ssn_programmatically(matched),
        PatternCategory::CreditCard => is_valid_credit_card_programmatically(matched),
        _ => true,
    }
}

/// Helper function to validate SSN based on US Social Security Administration rules.
///
/// Validates the structural components against known invalid patterns without
/// external data. Expected format "XXX-XX-XXXX".
pub fn is_valid_ssn_programmatically(ssn: &str) -> bool {
    let mut parts = ssn.split('-');

    let (Some(area), Some(group), Some(serial), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if area.len() != 3 || group.len() != 2 || serial.len() != 4 {
        return false;
    }

    let Some(area_num) = area.parse::<u16>().ok() else { return false };
    let Some(group_num) = group.parse::<u8>().ok() else { return false };
    let Some(serial_num) = serial.parse::<u16>().ok() else { return false };

    // Invalid SSN patterns per historical and current SSA rules.
    let invalid_area = (area_num == 0) || (area_num == 666) || (area_num >= 900);
    let invalid_group = group_num == 0;
    let invalid_serial = serial_num == 0;

    !(invalid_area || invalid_group || invalid_serial)
}

/// Validates a number using the Luhn algorithm.
///
/// # Arguments
///
/// * `num_str` - A string slice containing only digits.
pub fn is_valid_luhn(num_str: &str) -> bool {
    let mut sum = 0;
    let mut alternate = false;

    for c in num_str.chars().rev() {
        let Some(mut digit) = c.to_digit(10) else { return false };

        if alternate {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        alternate = !alternate;
    }

    sum % 10 == 0
}

/// Helper function to validate payment card numbers via the Luhn checksum.
///
/// Strips all non-digit characters from the input string before applying the
/// checksum.
pub fn is_valid_credit_card_programmatically(cc_number: &str) -> bool {
    let digits: String = cc_number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    is_valid_luhn(&digits)
}
