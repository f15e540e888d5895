use crate::common::EngagementError;

/// Normalize a phone number to E.164 for use as the patient contact key.
///
/// Accepts the formats Twilio sends on webhooks (`+15551234567`) as well as
/// bare 10/11-digit US numbers from enrollment forms.
pub fn normalize(input: &str) -> Result<String, EngagementError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EngagementError::Validation(
            "phone number is empty".to_string(),
        ));
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if trimmed.starts_with('+') && digits.len() >= 10 {
        format!("+{}", digits)
    } else if digits.len() == 10 {
        format!("+1{}", digits)
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{}", digits)
    } else {
        return Err(EngagementError::Validation(format!(
            "unrecognized phone number format: {}",
            trimmed
        )));
    };

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e164_passes_through() {
        assert_eq!(normalize("+15551234567").unwrap(), "+15551234567");
    }

    #[test]
    fn ten_digit_us_number_gets_country_code() {
        assert_eq!(normalize("5551234567").unwrap(), "+15551234567");
    }

    #[test]
    fn formatted_number_is_stripped() {
        assert_eq!(normalize("(555) 123-4567").unwrap(), "+15551234567");
    }

    #[test]
    fn eleven_digit_with_leading_one() {
        assert_eq!(normalize("15551234567").unwrap(), "+15551234567");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            normalize("   "),
            Err(EngagementError::Validation(_))
        ));
    }

    #[test]
    fn short_number_is_rejected() {
        assert!(matches!(
            normalize("12345"),
            Err(EngagementError::Validation(_))
        ));
    }
}
