//! Shell commands for reading and writing a remote file
//!
//! File content never passes through shell parsing: whole-file writes are
//! base64-encoded and single lines are passed as a quoted `printf` argument.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use shell_words::quote;

/// Builds the read, overwrite and append commands for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommands {
    sudo: bool,
}

impl FileCommands {
    /// Commands prefixed with `sudo` when `sudo` is set
    #[inline]
    #[must_use]
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    /// Whether commands are prefixed with `sudo`
    #[inline]
    #[must_use]
    pub fn uses_sudo(&self) -> bool {
        self.sudo
    }

    fn prefix(&self) -> &'static str {
        if self.sudo {
            "sudo "
        } else {
            ""
        }
    }

    /// Print the file
    #[must_use]
    pub fn read(&self, path: &str) -> String {
        format!("{}cat {}", self.prefix(), quote(path))
    }

    /// Replace the file content with `content`
    ///
    /// The payload is decoded into a temporary file first and the target is
    /// only opened once decoding succeeded. The command exits with the status
    /// of the first failing step and always removes the temporary file.
    #[must_use]
    pub fn overwrite(&self, path: &str, content: &[u8]) -> String {
        format!(
            "tmp=$(mktemp) && echo {} | base64 -d > \"$tmp\" && {}tee {} < \"$tmp\" > /dev/null ; \
             rc=$? ; rm -f \"$tmp\" ; exit $rc",
            STANDARD.encode(content),
            self.prefix(),
            quote(path)
        )
    }

    /// Append `line` plus a newline, preceded by a newline when the file
    /// does not end with one
    #[must_use]
    pub fn append(&self, path: &str, line: &str, separate: bool) -> String {
        let format = if separate { r"'\n%s\n'" } else { r"'%s\n'" };
        format!(
            "printf {format} {} | {}tee -a {} > /dev/null",
            quote(line),
            self.prefix(),
            quote(path)
        )
    }
}

impl Default for FileCommands {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_with_and_without_sudo() {
        assert_eq!(
            FileCommands::new(true).read("/etc/memcached.conf"),
            "sudo cat /etc/memcached.conf"
        );
        assert_eq!(
            FileCommands::new(false).read("/tmp/m.conf"),
            "cat /tmp/m.conf"
        );
    }

    #[test]
    fn overwrite_decodes_before_touching_target() {
        let cmd = FileCommands::default().overwrite("/etc/memcached.conf", b"-m 64\n");
        assert_eq!(
            cmd,
            "tmp=$(mktemp) && echo LW0gNjQK | base64 -d > \"$tmp\" && \
             sudo tee /etc/memcached.conf < \"$tmp\" > /dev/null ; \
             rc=$? ; rm -f \"$tmp\" ; exit $rc"
        );
    }

    #[test]
    fn overwrite_encodes_raw_bytes() {
        let cmd = FileCommands::new(false).overwrite("/tmp/m.conf", b"\xe9\n");
        assert!(cmd.contains("echo 6Qo= | base64 -d"));
        assert!(cmd.contains("&& tee /tmp/m.conf <"));
    }

    #[test]
    fn append_quotes_line() {
        let cmd = FileCommands::default().append("/etc/memcached.conf", "-l 0.0.0.0", false);
        assert_eq!(
            cmd,
            r"printf '%s\n' '-l 0.0.0.0' | sudo tee -a /etc/memcached.conf > /dev/null"
        );
    }

    #[test]
    fn append_separated_from_unterminated_line() {
        let cmd = FileCommands::new(false).append("/tmp/m.conf", "-m 64", true);
        assert!(cmd.starts_with(r"printf '\n%s\n' "));
        assert!(cmd.contains("| tee -a /tmp/m.conf"));
    }

    #[test]
    fn hostile_path_is_quoted() {
        let cmd = FileCommands::new(false).read("/tmp/a b;rm -rf x");
        assert_eq!(cmd, "cat '/tmp/a b;rm -rf x'");
    }
}
