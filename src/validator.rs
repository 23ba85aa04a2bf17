//! Input validation for amounts, names, mobile numbers and PINs.
//!
//! Every check is a pure function from raw form text to either a normalized
//! value or the reason it was rejected. Nothing here touches session state;
//! balance checks take the available balance as an argument.
use crate::config::BankConfig;
use crate::error::{BusinessRuleError, FieldError, ValidationError};
use crate::types::Amount;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

const PIN_LEN: usize = 4;
const NAME_FORBIDDEN: [char; 5] = ['<', '>', '&', '"', '\''];

/// Parse and range-check an amount, rounding to two decimal places.
///
/// The decimal-place limit is applied to the text as typed, so `"10.000"`
/// is rejected even though it rounds cleanly. Exponent notation is accepted
/// and `Infinity` is treated as an unbounded number.
pub fn validate_amount(raw: &str, config: &BankConfig) -> Result<Amount, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::AmountRequired);
    }
    let too_large = ValidationError::TooLarge {
        max: config.amount_max,
    };

    let value = match text {
        "Infinity" | "+Infinity" => return Err(too_large),
        "-Infinity" => return Err(ValidationError::NonPositive),
        // digit separators are not part of a typed number
        _ if text.contains('_') => return Err(ValidationError::NotANumber),
        _ => Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| ValidationError::NotANumber)?,
    };
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositive);
    }
    if value > to_decimal(config.amount_max) {
        return Err(too_large);
    }
    if let Some(fraction) = text.split('.').nth(1) {
        if fraction.chars().count() > 2 {
            return Err(ValidationError::TooManyDecimals);
        }
    }

    let minor = (value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::ONE_HUNDRED)
        .to_u64()
        .ok_or(too_large)?;
    if minor == 0 {
        return Err(ValidationError::NonPositive);
    }

    Ok(Amount::from_minor(minor))
}

fn to_decimal(amount: Amount) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(amount.minor_units()), 2)
}

pub fn check_funds(amount: Amount, available: Amount) -> Result<(), BusinessRuleError> {
    if amount > available {
        return Err(BusinessRuleError::InsufficientBalance { available });
    }
    Ok(())
}

/// Amount validation for withdrawals and transfers: the rounded amount must
/// also be covered by `available`.
pub fn validate_debit(
    raw: &str,
    config: &BankConfig,
    available: Amount,
) -> Result<Amount, FieldError> {
    let amount = validate_amount(raw, config)?;
    check_funds(amount, available)?;
    Ok(amount)
}

/// Returns the trimmed name. Callers escape it with [`escape_html`] before
/// storing.
pub fn validate_name(raw: &str, config: &BankConfig) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Err(ValidationError::NameRequired);
    }
    if len < config.name_min_len {
        return Err(ValidationError::NameTooShort {
            min: config.name_min_len,
        });
    }
    if len > config.name_max_len {
        return Err(ValidationError::NameTooLong {
            max: config.name_max_len,
        });
    }
    if trimmed.contains(NAME_FORBIDDEN) {
        return Err(ValidationError::InvalidNameChars);
    }

    Ok(trimmed.to_string())
}

/// Strip spaces and dashes, keeping a leading `+`. Without a leading `+`
/// every non-digit is dropped.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');

    trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .filter(|c| has_plus || c.is_ascii_digit())
        .collect()
}

pub fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidPhoneFormat);
    }

    let misplaced_plus = trimmed.rfind('+').is_some_and(|i| i != 0);
    if trimmed.matches('+').count() > 1 || misplaced_plus {
        return Err(ValidationError::MalformedSign);
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if !all_digits(digits) {
        return Err(ValidationError::InvalidPhoneChars);
    }

    let mobile = normalize_phone(trimmed);
    if !is_known_format(&mobile) {
        return Err(ValidationError::InvalidPhoneFormat);
    }

    Ok(mobile)
}

pub fn validate_pin(raw: &str) -> Result<String, ValidationError> {
    let pin = raw.trim();
    if pin.len() != PIN_LEN || !all_digits(pin) {
        return Err(ValidationError::InvalidPin);
    }
    Ok(pin.to_string())
}

/// Escape the characters that are significant in HTML text content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// +91 and 10 digits, +254 and 9 digits, 0 and 9-10 digits, or 10 bare digits
fn is_known_format(mobile: &str) -> bool {
    let digits_of = |rest: &str, lens: std::ops::RangeInclusive<usize>| {
        all_digits(rest) && lens.contains(&rest.len())
    };

    if let Some(rest) = mobile.strip_prefix("+91") {
        if digits_of(rest, 10..=10) {
            return true;
        }
    }
    if let Some(rest) = mobile.strip_prefix("+254") {
        if digits_of(rest, 9..=9) {
            return true;
        }
    }
    if let Some(rest) = mobile.strip_prefix('0') {
        if digits_of(rest, 9..=10) {
            return true;
        }
    }
    digits_of(mobile, 10..=10)
}
