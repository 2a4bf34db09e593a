//! Flag assignments

use std::fmt;

/// A `(flag, value)` pair to be written as the line `<flag> <value>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagAssignment {
    flag: String,
    value: String,
}

impl FlagAssignment {
    /// Create an assignment
    #[inline]
    pub fn new(flag: impl Into<String>, value: impl ToString) -> Self {
        Self {
            flag: flag.into(),
            value: value.to_string(),
        }
    }

    /// Flag name, e.g. `-m`
    #[inline]
    #[must_use]
    pub fn flag(&self) -> &str {
        &self.flag
    }

    /// Value to assign
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The full config line
    #[inline]
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.flag, self.value)
    }

    /// Flag with leading dashes removed, for operation labels
    #[must_use]
    pub fn slug(&self) -> &str {
        let trimmed = self.flag.trim_start_matches('-');
        if trimmed.is_empty() {
            &self.flag
        } else {
            trimmed
        }
    }
}

impl fmt::Display for FlagAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flag, self.value)
    }
}

/// Whether `line` sets `flag`: the literal flag followed by a space
///
/// Works on raw bytes so lines that are not valid UTF-8 can still be tested.
#[inline]
#[must_use]
pub fn line_sets_flag(line: impl AsRef<[u8]>, flag: &str) -> bool {
    line.as_ref()
        .strip_prefix(flag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_display_agree() {
        let a = FlagAssignment::new("-m", 256);
        assert_eq!(a.line(), "-m 256");
        assert_eq!(a.to_string(), a.line());
    }

    #[test]
    fn slug_strips_dashes() {
        assert_eq!(FlagAssignment::new("-m", 1).slug(), "m");
        assert_eq!(FlagAssignment::new("--threads", 4).slug(), "threads");
        assert_eq!(FlagAssignment::new("--", 4).slug(), "--");
    }

    #[test]
    fn literal_prefix_match() {
        assert!(line_sets_flag("-m 64", "-m"));
        assert!(line_sets_flag("-m ", "-m"));
        assert!(!line_sets_flag("-m", "-m"));
        assert!(!line_sets_flag("-max 3", "-m"));
        assert!(!line_sets_flag("# -m 64", "-m"));
        assert!(!line_sets_flag(" -m 64", "-m"));
        assert!(!line_sets_flag("-p 11211", "-m"));
        assert!(line_sets_flag(b"-m \xff".as_slice(), "-m"));
    }
}
