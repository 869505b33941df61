use std::fmt;

use serde::Serialize;

/// Machine-readable reason a course or lesson draft was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKey {
    NoTitle,
    NoDescription,
    NoBody,
    NoDecksReferenced,
}

impl ErrorKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKey::NoTitle => "NO_TITLE",
            ErrorKey::NoDescription => "NO_DESCRIPTION",
            ErrorKey::NoBody => "NO_BODY",
            ErrorKey::NoDecksReferenced => "NO_DECKS_REFERENCED",
        }
    }
}

/// All problems found while validating a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    #[serde(rename = "errors")]
    keys: Vec<ErrorKey>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: ErrorKey) {
        self.keys.push(key);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.keys.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[ErrorKey] {
        &self.keys
    }

    #[must_use]
    pub fn contains(&self, key: ErrorKey) -> bool {
        self.keys.contains(&key)
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one key was added.
    pub fn into_result(self) -> Result<(), Self> {
        if self.has_errors() { Err(self) } else { Ok(()) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .keys
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "validation failed: [{joined}]")
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn display_lists_keys_in_order() {
        let mut errors = ValidationErrors::new();
        errors.add(ErrorKey::NoTitle);
        errors.add(ErrorKey::NoDecksReferenced);
        assert_eq!(
            errors.to_string(),
            "validation failed: [NO_TITLE, NO_DECKS_REFERENCED]"
        );
    }
}
