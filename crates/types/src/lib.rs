//! Validated text primitives shared by the corridor crates.
//!
//! Destination sectors, beds and external facilities all arrive as free text from the
//! ward. [`NonEmptyText`] is the one place where "blank" is rejected, so the transfer
//! workflow can take it as proof that a destination was actually supplied.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a trimmed, uppercased `NonEmptyText`.
    ///
    /// Ward sectors and receiving facilities are recorded in uppercase.
    pub fn uppercase(input: impl AsRef<str>) -> Result<Self, TextError> {
        Self::new(input).map(|text| Self(text.0.to_uppercase()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let text = NonEmptyText::new("  LEITO 12 ").unwrap();
        assert_eq!(text.as_str(), "LEITO 12");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(NonEmptyText::new("").unwrap_err(), TextError::Empty);
        assert_eq!(NonEmptyText::new(" \t\n").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn uppercase_normalises_case() {
        let text = NonEmptyText::uppercase(" hospital x ").unwrap();
        assert_eq!(text.as_str(), "HOSPITAL X");
    }
}
