//! Reusable field validators and enum decoding helpers

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use validator::ValidationError;

/// Calendar date in `YYYY-MM-DD` form
///
/// For use with `#[validate(custom(function = "validate_date"))]`. The rule
/// name reported on failure is `date`.
pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| {
            let mut error = ValidationError::new("date");
            error.add_param(Cow::from("value"), &value);
            error
        })
}

/// Pick the variant of `valid` whose display form matches `value`, ignoring case
///
/// The error message lists every valid value, in order.
pub fn match_ignore_case<T>(value: &str, valid: &[T]) -> Result<T, String>
where
    T: Copy + fmt::Display,
{
    valid
        .iter()
        .copied()
        .find(|candidate| candidate.to_string().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let names = valid
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Value '{}' isn't a valid value. The valid values are: {}",
                value, names
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl fmt::Display for Color {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                Color::Red => "RED",
                Color::Green => "GREEN",
            })
        }
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-02-29").is_ok());
        assert!(validate_date("2023-02-29").is_err());
        assert!(validate_date("29/02/2024").is_err());
        assert_eq!(validate_date("tomorrow").unwrap_err().code, "date");
    }

    #[test]
    fn test_match_ignore_case() {
        let valid = [Color::Red, Color::Green];
        assert_eq!(match_ignore_case("red", &valid), Ok(Color::Red));
        assert_eq!(match_ignore_case("GrEeN", &valid), Ok(Color::Green));
        assert_eq!(
            match_ignore_case("blue", &valid).unwrap_err(),
            "Value 'blue' isn't a valid value. The valid values are: RED, GREEN"
        );
    }
}
