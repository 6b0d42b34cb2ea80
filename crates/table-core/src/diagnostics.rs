//! Ordered, append-only problem log.

use std::fmt;

/// Human-readable problems collected during one import or export.
///
/// Entries are kept in encounter order and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one problem.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(diagnostic = %message, "recorded diagnostic");
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }

    /// Check if any entry contains `needle`.
    pub fn any_contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.contains(needle))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_encounter_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.push("first");
        diagnostics.push(String::from("second"));

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.iter().collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(diagnostics.any_contains("sec"));
        assert!(!diagnostics.any_contains("third"));
        assert_eq!(diagnostics.to_string(), "first\nsecond\n");
        assert_eq!(diagnostics.into_vec(), vec!["first", "second"]);
    }
}
