//! Testing utilities for the Memcached plugin workspace
//!
//! [`FakeHost`] is an in-memory stand-in for a managed server. It understands
//! the small shell dialect the plugin emits (pipelines, `&&`, `||`, `;`,
//! `sudo`, `<` and `>` redirects, `$var` expansion) and the handful of
//! programs it calls (`cat`, `tee`, `base64`, `printf`, `mktemp`, `rm`,
//! `systemctl`, `apt-get`, `dpkg`, `grep`, `head`, `memcached`), so tests can
//! assert on resulting file content and service state instead of on command
//! strings.

#![allow(missing_docs)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mcd_exec::{CommandExecutor, ExecError, ExecOutput};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Version string reported by the fake `memcached -h`
pub const FAKE_MEMCACHED_VERSION: &str = "1.6.14";

/// Config shipped by the Debian memcached package (trimmed)
pub const DEBIAN_MEMCACHED_CONF: &str = "\
# memcached default config file
# 2003 - Jay Bonci <jaybonci@debian.org>
-d
logfile /var/log/memcached.log
-m 64
-p 11211
-u memcache
-l 127.0.0.1
-P /var/run/memcached/memcached.pid
";

/// A command issued against the fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    pub label: String,
    pub command: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitState {
    pub active: bool,
    pub enabled: bool,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, String>,
    root_owned: BTreeSet<String>,
    units: BTreeMap<String, UnitState>,
    packages: BTreeSet<String>,
    issued: Vec<IssuedCommand>,
    responses: Vec<(String, String)>,
    failing_labels: BTreeMap<String, String>,
    broken_programs: BTreeSet<String>,
    temp_files: usize,
    unreachable: bool,
}

/// Stage failure: exit code, stdout, stderr
type StageError = (i32, String, String);

/// Shell variables of one command
type Vars = BTreeMap<String, String>;

/// In-memory managed host
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the memcached package installed, running and enabled
    pub fn with_memcached() -> Self {
        Self::new()
            .with_package("memcached")
            .with_package("libmemcached-tools")
            .with_file("/etc/memcached.conf", DEBIAN_MEMCACHED_CONF)
            .with_unit("memcached", UnitState { active: true, enabled: true })
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.state.lock().files.insert(path.to_string(), content.to_string());
        self
    }

    /// Writes to `path` require `sudo`
    pub fn with_root_owned(self, path: &str) -> Self {
        self.state.lock().root_owned.insert(path.to_string());
        self
    }

    pub fn with_package(self, name: &str) -> Self {
        self.state.lock().packages.insert(name.to_string());
        self
    }

    pub fn with_unit(self, unit: &str, state: UnitState) -> Self {
        self.state.lock().units.insert(unit.to_string(), state);
        self
    }

    /// Answer commands starting with `prefix` with `stdout`
    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.state
            .lock()
            .responses
            .push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Commands issued under `label` exit 1 with `stderr`
    pub fn fail_label(self, label: &str, stderr: &str) -> Self {
        self.state
            .lock()
            .failing_labels
            .insert(label.to_string(), stderr.to_string());
        self
    }

    /// `program` exits 1 wherever it appears in a command
    pub fn with_broken_program(self, program: &str) -> Self {
        self.state.lock().broken_programs.insert(program.to_string());
        self
    }

    /// Every command fails with a connection error
    pub fn unreachable(self) -> Self {
        self.state.lock().unreachable = true;
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_lines(&self, path: &str) -> Vec<String> {
        self.file(path)
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.state.lock().files.insert(path.to_string(), content.to_string());
    }

    pub fn unit(&self, unit: &str) -> UnitState {
        self.state.lock().units.get(unit).copied().unwrap_or_default()
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.state.lock().packages.contains(name)
    }

    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.state.lock().issued.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.state.lock().issued.iter().map(|c| c.label.clone()).collect()
    }

    /// Number of issued commands containing `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.state
            .lock()
            .issued
            .iter()
            .filter(|c| c.command.contains(needle))
            .count()
    }

    pub fn clear_issued(&self) {
        self.state.lock().issued.clear();
    }

    fn run(&self, command: &str) -> Result<String, StageError> {
        let tokens = shell_words::split(command).map_err(|e| (2, String::new(), e.to_string()))?;

        let mut vars = Vars::new();
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut code = 0;
        for statement in tokens.split(|t| t == ";") {
            code = match self.run_list(statement, &mut vars) {
                Ok(out) => {
                    stdout.push_str(&out);
                    0
                }
                Err((code, out, err)) => {
                    stdout.push_str(&out);
                    stderr.push_str(&err);
                    code
                }
            };
            vars.insert("?".to_string(), code.to_string());
            if statement.first().is_some_and(|t| t == "exit") {
                break;
            }
        }

        if code == 0 {
            Ok(stdout)
        } else {
            Err((code, stdout, stderr))
        }
    }

    /// Pipelines joined by `&&` and `||`, evaluated left to right
    fn run_list(&self, tokens: &[String], vars: &mut Vars) -> Result<String, StageError> {
        let mut segments: Vec<(&str, &[String])> = Vec::new();
        let mut op = "&&";
        let mut start = 0;
        for (i, token) in tokens.iter().enumerate() {
            if token == "&&" || token == "||" {
                segments.push((op, &tokens[start..i]));
                op = token.as_str();
                start = i + 1;
            }
        }
        segments.push((op, &tokens[start..]));

        let mut out = String::new();
        let mut last: Result<(), (i32, String)> = Ok(());
        for (op, pipeline) in segments {
            if (op == "&&") != last.is_ok() {
                continue;
            }
            last = match self.run_pipeline(pipeline, vars) {
                Ok(o) => {
                    out.push_str(&o);
                    Ok(())
                }
                Err((code, o, err)) => {
                    out.push_str(&o);
                    Err((code, err))
                }
            };
        }
        match last {
            Ok(()) => Ok(out),
            Err((code, err)) => Err((code, out, err)),
        }
    }

    fn run_pipeline(&self, tokens: &[String], vars: &mut Vars) -> Result<String, StageError> {
        let mut stdin = String::new();
        let mut result = Ok(String::new());
        for stage in tokens.split(|t| t == "|") {
            result = self.run_stage(stage, &stdin, vars);
            stdin = match &result {
                Ok(out) => out.clone(),
                Err((_, out, _)) => out.clone(),
            };
        }
        result
    }

    fn run_stage(&self, stage: &[String], stdin: &str, vars: &mut Vars) -> Result<String, StageError> {
        if let [word] = stage {
            if let Some((name, value)) = word.split_once('=') {
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    let value = if value == "$(mktemp)" {
                        self.program(&["mktemp"], "", false)?.trim_end().to_string()
                    } else {
                        expand(value, vars)
                    };
                    vars.insert(name.to_string(), value);
                    return Ok(String::new());
                }
            }
        }

        let words: Vec<String> = stage.iter().map(|t| expand(t, vars)).collect();
        let mut args: Vec<&str> = Vec::with_capacity(words.len());
        let mut output_to: Option<&str> = None;
        let mut input_from: Option<&str> = None;
        let mut iter = words.iter();
        while let Some(token) = iter.next() {
            match token.as_str() {
                ">" => output_to = iter.next().map(String::as_str),
                "<" => input_from = iter.next().map(String::as_str),
                "2>/dev/null" => {}
                other => args.push(other),
            }
        }

        let redirected;
        let stdin = match input_from {
            Some(path) => {
                redirected = self.state.lock().files.get(path).cloned().ok_or_else(|| {
                    (1, String::new(), format!("sh: 1: cannot open {path}: No such file"))
                })?;
                redirected.as_str()
            }
            None => stdin,
        };

        let sudo = args.first() == Some(&"sudo");
        if sudo {
            args.remove(0);
        }

        let out = self.program(&args, stdin, sudo)?;
        match output_to {
            None => Ok(out),
            Some("/dev/null") => Ok(String::new()),
            Some(path) => {
                self.state.lock().files.insert(path.to_string(), out);
                Ok(String::new())
            }
        }
    }

    fn program(&self, args: &[&str], stdin: &str, sudo: bool) -> Result<String, StageError> {
        let mut state = self.state.lock();
        if let Some(program) = args.first().filter(|p| state.broken_programs.contains(**p)) {
            return Err((1, String::new(), format!("{program}: simulated failure")));
        }
        match args {
            ["true"] => Ok(String::new()),
            ["false"] => Err((1, String::new(), String::new())),
            ["exit", code] => match code.parse::<i32>() {
                Ok(0) => Ok(String::new()),
                Ok(code) => Err((code, String::new(), String::new())),
                Err(_) => Err((2, String::new(), format!("exit: Illegal number: {code}"))),
            },
            ["mktemp"] => {
                state.temp_files += 1;
                let path = format!("/tmp/tmp.{}", state.temp_files);
                state.files.insert(path.clone(), String::new());
                Ok(format!("{path}\n"))
            }
            ["rm", "-f", paths @ ..] => {
                for path in paths {
                    state.files.remove(*path);
                }
                Ok(String::new())
            }
            ["cat", path] => state.files.get(*path).cloned().ok_or_else(|| {
                (1, String::new(), format!("cat: {path}: No such file or directory"))
            }),
            ["echo", rest @ ..] => Ok(format!("{}\n", rest.join(" "))),
            ["printf", format, rest @ ..] => {
                let mut out = format.replace("\\n", "\n");
                for arg in rest {
                    out = out.replacen("%s", arg, 1);
                }
                Ok(out)
            }
            ["base64", "-d"] => STANDARD
                .decode(stdin.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| (1, String::new(), "base64: invalid input".to_string())),
            ["tee", rest @ ..] => {
                let (append, path) = match rest {
                    ["-a", path] => (true, *path),
                    [path] => (false, *path),
                    _ => return Err((1, String::new(), "tee: bad usage".to_string())),
                };
                if state.root_owned.contains(path) && !sudo {
                    return Err((1, String::new(), format!("tee: {path}: Permission denied")));
                }
                let file = state.files.entry(path.to_string()).or_default();
                if append {
                    file.push_str(stdin);
                } else {
                    *file = stdin.to_string();
                }
                Ok(stdin.to_string())
            }
            ["systemctl", verb, unit] => {
                let entry = state.units.entry((*unit).to_string()).or_default();
                match *verb {
                    "start" | "restart" => entry.active = true,
                    "stop" => entry.active = false,
                    "enable" => entry.enabled = true,
                    "disable" => entry.enabled = false,
                    "is-active" => {
                        return if entry.active {
                            Ok("active\n".to_string())
                        } else {
                            Err((3, "inactive\n".to_string(), String::new()))
                        };
                    }
                    other => {
                        return Err((1, String::new(), format!("Unknown command verb {other}.")))
                    }
                }
                Ok(String::new())
            }
            ["apt-get", "update", ..] | ["apt-get", "autoremove", ..] => Ok(String::new()),
            ["apt-get", "install", "-y", packages @ ..] => {
                state.packages.extend(packages.iter().map(|p| (*p).to_string()));
                Ok(String::new())
            }
            ["apt-get", "remove", "-y", packages @ ..] => {
                for p in packages {
                    state.packages.remove(*p);
                }
                Ok(String::new())
            }
            ["dpkg", "-s", package] => {
                if state.packages.contains(*package) {
                    Ok(format!(
                        "Package: {package}\nStatus: install ok installed\nPriority: optional\n"
                    ))
                } else {
                    Err((
                        1,
                        String::new(),
                        format!("dpkg-query: package '{package}' is not installed"),
                    ))
                }
            }
            ["grep", "-i", pattern] => {
                let (anchored, needle) = match pattern.strip_prefix('^') {
                    Some(rest) => (true, rest.to_lowercase()),
                    None => (false, pattern.to_lowercase()),
                };
                let matched: Vec<&str> = stdin
                    .lines()
                    .filter(|line| {
                        let line = line.to_lowercase();
                        if anchored {
                            line.starts_with(&needle)
                        } else {
                            line.contains(&needle)
                        }
                    })
                    .collect();
                if matched.is_empty() {
                    Err((1, String::new(), String::new()))
                } else {
                    Ok(format!("{}\n", matched.join("\n")))
                }
            }
            ["head", "-n", count] => {
                let n: usize = count.parse().unwrap_or(10);
                Ok(stdin.lines().take(n).map(|l| format!("{l}\n")).collect())
            }
            ["memcached", "-h"] => {
                if state.packages.contains("memcached") {
                    Ok(format!(
                        "memcached {FAKE_MEMCACHED_VERSION}\n-p, --port=<num>          TCP port to listen on\n"
                    ))
                } else {
                    Err((127, String::new(), "sh: 1: memcached: not found".to_string()))
                }
            }
            [program, ..] => Err((127, String::new(), format!("sh: 1: {program}: not found"))),
            [] => Ok(String::new()),
        }
    }
}

/// `$name` becomes the variable's value, anything else is literal
fn expand(token: &str, vars: &Vars) -> String {
    match token.strip_prefix('$') {
        Some(name) if !name.is_empty() => vars.get(name).cloned().unwrap_or_default(),
        _ => token.to_string(),
    }
}

#[async_trait::async_trait]
impl CommandExecutor for FakeHost {
    async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError> {
        let (unreachable, failure, canned) = {
            let mut state = self.state.lock();
            state.issued.push(IssuedCommand {
                label: label.to_string(),
                command: command.to_string(),
            });
            let canned = state
                .responses
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix.as_str()))
                .map(|(_, out)| out.clone());
            (state.unreachable, state.failing_labels.get(label).cloned(), canned)
        };

        if unreachable {
            return Err(ExecError::Connection {
                label: label.to_string(),
                message: "ssh: connect to host fake port 22: Connection refused".to_string(),
            });
        }
        if let Some(stderr) = failure {
            return Err(ExecError::non_zero(label, Some(1), "", stderr));
        }
        if let Some(stdout) = canned {
            return Ok(ExecOutput::stdout(stdout));
        }

        match self.run(command) {
            Ok(stdout) => Ok(ExecOutput::stdout(stdout)),
            Err((code, stdout, stderr)) => Err(ExecError::non_zero(label, Some(code), stdout, stderr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrite_then_read() {
        let host = FakeHost::new();
        host.exec("echo LW0gNjQK | base64 -d | sudo tee /etc/m.conf > /dev/null", "w")
            .await
            .unwrap();
        let out = host.exec("sudo cat /etc/m.conf", "r").await.unwrap();
        assert_eq!(out.stdout, "-m 64\n");
    }

    #[tokio::test]
    async fn staged_overwrite_through_temp_file() {
        let host = FakeHost::new().with_file("/etc/m.conf", "-m 32\n");
        host.exec(
            r#"tmp=$(mktemp) && echo LW0gNjQK | base64 -d > "$tmp" && sudo tee /etc/m.conf < "$tmp" > /dev/null ; rc=$? ; rm -f "$tmp" ; exit $rc"#,
            "w",
        )
        .await
        .unwrap();
        assert_eq!(host.file("/etc/m.conf").unwrap(), "-m 64\n");
        assert!(host.file("/tmp/tmp.1").is_none());
    }

    #[tokio::test]
    async fn broken_decoder_stops_the_chain() {
        let host = FakeHost::new()
            .with_file("/etc/m.conf", "-m 32\n")
            .with_broken_program("base64");
        let err = host
            .exec(
                r#"tmp=$(mktemp) && echo LW0gNjQK | base64 -d > "$tmp" && tee /etc/m.conf < "$tmp" > /dev/null ; rc=$? ; rm -f "$tmp" ; exit $rc"#,
                "w",
            )
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(host.file("/etc/m.conf").unwrap(), "-m 32\n");
        assert!(host.file("/tmp/tmp.1").is_none());
    }

    #[tokio::test]
    async fn and_list_short_circuits() {
        let host = FakeHost::new();
        assert!(host.exec("false && true", "x").await.is_err());
        let out = host.exec("echo a && echo b", "x").await.unwrap();
        assert_eq!(out.stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn append_with_printf() {
        let host = FakeHost::new().with_file("/etc/m.conf", "-d\n");
        host.exec(r"printf '%s\n' '-p 11211' | tee -a /etc/m.conf > /dev/null", "a")
            .await
            .unwrap();
        assert_eq!(host.file("/etc/m.conf").unwrap(), "-d\n-p 11211\n");
    }

    #[tokio::test]
    async fn root_owned_needs_sudo() {
        let host = FakeHost::new().with_root_owned("/etc/m.conf");
        let err = host
            .exec("echo eA== | base64 -d | tee /etc/m.conf > /dev/null", "w")
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert!(host.file("/etc/m.conf").is_none());
    }

    #[tokio::test]
    async fn or_true_swallows_failure() {
        let host = FakeHost::new();
        assert!(host.exec("false || true", "x").await.is_ok());
        assert!(host.exec("false", "x").await.is_err());
    }

    #[tokio::test]
    async fn pipeline_status_is_last_stage() {
        let host = FakeHost::new();
        let out = host.exec("memcached -h | head -n 1", "v").await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn systemctl_tracks_units() {
        let host = FakeHost::new();
        assert!(host.exec("sudo systemctl is-active memcached", "s").await.is_err());
        host.exec("sudo systemctl start memcached", "s").await.unwrap();
        let out = host.exec("sudo systemctl is-active memcached", "s").await.unwrap();
        assert_eq!(out.trimmed(), "active");
    }

    #[tokio::test]
    async fn failing_label_and_unreachable() {
        let host = FakeHost::new().fail_label("boom", "nope");
        assert!(host.exec("true", "boom").await.is_err());
        assert!(host.exec("true", "fine").await.is_ok());

        let down = FakeHost::new().unreachable();
        let err = down.exec("true", "x").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(down.labels(), vec!["x"]);
    }
}
