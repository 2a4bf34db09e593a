//! In-memory view of a line-oriented config file
//!
//! A config file is an ordered list of byte lines. A line is a flag line when
//! it begins with a flag followed by a space; everything else (comments, blank
//! lines, flags nobody asked about) is opaque and kept byte for byte, whatever
//! its encoding.

use crate::assignment::{line_sets_flag, FlagAssignment};
use std::borrow::Cow;

/// What applying one assignment did to the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagOutcome {
    /// An existing flag line was rewritten
    Replaced {
        /// 1-based line number of the rewritten line
        line: usize,
        /// Previous content of that line, lossily decoded
        previous: String,
        /// Further lines for the same flag that were dropped
        duplicates_removed: usize,
    },
    /// The flag line already had the requested value
    Unchanged {
        /// 1-based line number
        line: usize,
    },
    /// No line set the flag; one was added at the end
    Appended,
}

impl FlagOutcome {
    /// Whether the file content changed
    #[inline]
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Ordered lines of a config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    lines: Vec<Vec<u8>>,
    trailing_newline: bool,
}

impl ConfigFile {
    /// Parse file content
    ///
    /// Lines are split on `\n` only, so a `\r` stays part of its line.
    #[must_use]
    pub fn parse(content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        if content.is_empty() {
            return Self::default();
        }
        let trailing_newline = content.ends_with(b"\n");
        let body = content.strip_suffix(b"\n").unwrap_or(content);
        Self {
            lines: body.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect(),
            trailing_newline,
        }
    }

    /// Build from lines, rendered with a trailing newline
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            trailing_newline: true,
        }
    }

    /// Lines in order, lossily decoded for display
    #[must_use]
    pub fn lines(&self) -> Vec<Cow<'_, str>> {
        self.lines.iter().map(|l| String::from_utf8_lossy(l)).collect()
    }

    /// Lines in order, as stored
    #[inline]
    #[must_use]
    pub fn raw_lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    /// Number of lines
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the file has no lines
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether the last line is newline-terminated
    ///
    /// An empty file counts as terminated.
    #[inline]
    #[must_use]
    pub fn ends_with_newline(&self) -> bool {
        self.lines.is_empty() || self.trailing_newline
    }

    /// Whether lines end in `\r\n`, judged by the last line
    #[must_use]
    pub fn uses_crlf(&self) -> bool {
        self.lines.last().is_some_and(|l| l.ends_with(b"\r"))
    }

    /// Value of the first line setting `flag`, without any trailing `\r`
    #[must_use]
    pub fn get_flag(&self, flag: &str) -> Option<Cow<'_, str>> {
        self.lines
            .iter()
            .find(|line| line_sets_flag(line, flag))
            .map(|line| {
                let value = &line[flag.len() + 1..];
                String::from_utf8_lossy(value.strip_suffix(b"\r").unwrap_or(value))
            })
    }

    /// Number of lines setting `flag`
    #[must_use]
    pub fn count_flag(&self, flag: &str) -> usize {
        self.lines
            .iter()
            .filter(|line| line_sets_flag(line, flag))
            .count()
    }

    /// Replace the first line setting the flag, or append one if none does
    ///
    /// Later lines for the same flag are dropped so exactly one remains. A
    /// replaced line keeps its `\r`; an appended line gets one when the file
    /// uses `\r\n` endings.
    pub fn set_flag(&mut self, assignment: &FlagAssignment) -> FlagOutcome {
        let flag = assignment.flag();
        let mut wanted = assignment.line().into_bytes();

        let Some(index) = self.lines.iter().position(|line| line_sets_flag(line, flag)) else {
            if self.uses_crlf() {
                wanted.push(b'\r');
            }
            self.lines.push(wanted);
            self.trailing_newline = true;
            return FlagOutcome::Appended;
        };

        if self.lines[index].ends_with(b"\r") {
            wanted.push(b'\r');
        }

        let before = self.lines.len();
        let mut position = 0;
        self.lines.retain(|line| {
            let keep = position <= index || !line_sets_flag(line, flag);
            position += 1;
            keep
        });
        let duplicates_removed = before - self.lines.len();

        if self.lines[index] == wanted && duplicates_removed == 0 {
            return FlagOutcome::Unchanged { line: index + 1 };
        }

        let previous = std::mem::replace(&mut self.lines[index], wanted);
        FlagOutcome::Replaced {
            line: index + 1,
            previous: String::from_utf8_lossy(&previous).into_owned(),
            duplicates_removed,
        }
    }

    /// Apply assignments in order
    pub fn apply_all<'a, I>(&mut self, assignments: I) -> Vec<FlagOutcome>
    where
        I: IntoIterator<Item = &'a FlagAssignment>,
    {
        assignments.into_iter().map(|a| self.set_flag(a)).collect()
    }

    /// Render back to file content
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        if self.lines.is_empty() {
            return Vec::new();
        }
        let mut out = self.lines.join(&b'\n');
        if self.trailing_newline {
            out.push(b'\n');
        }
        out
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            trailing_newline: true,
        }
    }
}

impl std::str::FromStr for ConfigFile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
