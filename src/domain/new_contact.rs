use crate::domain::{ContactEmail, ContactName, ValidationError};

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: ContactName,
    pub email: ContactEmail,
}

impl NewContact {
    pub fn parse(name: String, email: String) -> Result<Self, ValidationError> {
        match (ContactName::parse(name), ContactEmail::parse(email)) {
            (Ok(name), Ok(email)) => Ok(Self { name, email }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(name_error), Err(email_error)) => Err(name_error.min(email_error)),
        }
    }
}
