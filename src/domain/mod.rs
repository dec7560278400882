mod contact_email;
mod contact_name;
mod new_contact;

pub use contact_email::ContactEmail;
pub use contact_name::ContactName;
pub use new_contact::NewContact;

/// Whitespace as a browser form sees it, including the byte order mark that
/// `char::is_whitespace` leaves out.
pub(crate) fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Lengths are measured in UTF-16 code units, the unit the contact form
/// counts in. An astral character such as an emoji counts twice.
pub(crate) fn utf16_length(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Reasons a submission is rejected before anything is written.
///
/// Variants are declared in check order, so when several checks fail the
/// smallest one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid name")]
    InvalidName,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Input too long")]
    InputTooLong,
}
