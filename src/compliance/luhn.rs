//! Luhn checksum validation and card-type classification

/// Validate a candidate card number with the Luhn algorithm
///
/// Non-digits (spaces, dashes) are stripped first. Numbers outside the
/// 13-19 digit range card networks issue are rejected outright.
pub fn validate_luhn(number: &str) -> bool {
    let digits: Vec<u32> = number.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let mut sum = 0;
    let mut alternate = false;
    for &digit in digits.iter().rev() {
        let mut digit = digit;
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

/// Card network, classified from the number prefix
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "visa",
            CardType::Mastercard => "mastercard",
            CardType::Amex => "amex",
            CardType::Discover => "discover",
            CardType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a card number by its issuer prefix
///
/// Informational only; classification never affects the block decision.
#[allow(dead_code)]
pub fn card_type(number: &str) -> CardType {
    let cleaned: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.len() < 4 {
        return CardType::Unknown;
    }

    if cleaned.starts_with('4') {
        CardType::Visa
    } else if ("51"..="55").contains(&&cleaned[..2]) {
        CardType::Mastercard
    } else if cleaned.starts_with("34") || cleaned.starts_with("37") {
        CardType::Amex
    } else if cleaned.starts_with("6011") || cleaned.starts_with("65") {
        CardType::Discover
    } else {
        CardType::Unknown
    }
}
