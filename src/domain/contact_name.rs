use crate::domain::{is_blank, utf16_length, ValidationError};

const MIN_LENGTH: usize = 2;
const MAX_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct ContactName(String);

impl ContactName {
    /// Trims the input and checks its length in UTF-16 code units.
    pub fn parse(s: String) -> Result<Self, ValidationError> {
        let name = s.trim_matches(is_blank);
        let length = utf16_length(name);

        if length < MIN_LENGTH {
            return Err(ValidationError::InvalidName);
        }
        if length > MAX_LENGTH {
            return Err(ValidationError::InputTooLong);
        }

        Ok(Self(name.to_string()))
    }
}

impl AsRef<str> for ContactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
