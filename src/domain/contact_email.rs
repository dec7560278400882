use std::fmt::Display;

use crate::domain::{is_blank, utf16_length, ValidationError};

const MAX_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct ContactEmail(String);

impl ContactEmail {
    /// Accepts `local@domain.tld` shaped addresses: no whitespace anywhere,
    /// exactly one `@`, and a `.` inside the domain with text on both sides.
    pub fn parse(s: String) -> Result<Self, ValidationError> {
        let email = s.trim_matches(is_blank);

        if !has_address_shape(email) {
            return Err(ValidationError::InvalidEmail);
        }
        if utf16_length(email) > MAX_LENGTH {
            return Err(ValidationError::InputTooLong);
        }

        Ok(Self(email.to_string()))
    }
}

fn has_address_shape(s: &str) -> bool {
    if s.chars().any(is_blank) {
        return false;
    }

    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

impl Display for ContactEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContactEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
