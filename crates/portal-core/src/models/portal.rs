//! Portal code model

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Z]+$").expect("Invalid regex"));

/// Short shared code identifying a portal
///
/// Valid codes are exactly the configured length and contain only uppercase
/// ASCII letters and digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortalCode(String);

impl PortalCode {
    /// Validate user input: trimmed, uppercased, exact `length`, alphanumeric.
    pub fn parse(candidate: &str, length: usize) -> Result<Self> {
        let code = candidate.trim().to_uppercase();
        if code.is_empty() {
            return Err(Error::validation("Please enter a Portal ID"));
        }
        if code.chars().count() != length {
            return Err(Error::validation(format!(
                "Portal ID must be {length} characters long"
            )));
        }
        if !CODE_PATTERN.is_match(&code) {
            return Err(Error::validation(
                "Portal ID may only contain letters and digits",
            ));
        }
        Ok(Self(code))
    }

    /// Generate a fresh random code of `length` characters.
    #[must_use]
    pub fn generate(length: usize) -> Self {
        let mut rng = rand::rng();
        let code = (0..length)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = PortalCode::parse("  ab12cd ", 6).unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn parse_accepts_only_the_configured_length() {
        for length in 1..=10 {
            let candidate = "A".repeat(length);
            let result = PortalCode::parse(&candidate, 6);
            if length == 6 {
                assert!(result.is_ok());
            } else {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::ValidationError);
            }
        }
    }

    #[test]
    fn parse_rejects_empty_and_symbols() {
        let empty = PortalCode::parse("   ", 6).unwrap_err();
        assert_eq!(empty.to_string(), "Please enter a Portal ID");
        assert!(PortalCode::parse("AB-12!", 6).is_err());
    }

    #[test]
    fn generated_codes_are_valid() {
        for length in [1, 6, 20, 40] {
            let code = PortalCode::generate(length);
            assert_eq!(code.as_str().len(), length);
            assert!(PortalCode::parse(code.as_str(), length).is_ok());
        }
    }
}
