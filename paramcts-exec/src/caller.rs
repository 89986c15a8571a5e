use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use paramcts_config::Callstring;
use regex::Regex;

use crate::compression;
use crate::error::{CallError, ExecutableError};

static VAR_IN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(?P<var>\S+?)\$").unwrap());

/// Compiles a `$name$`-style output pattern into a named-capture regex,
/// mirroring `configuration.py`'s `convert_regex`.
fn convert_pattern(pattern: &str) -> Regex {
    let rewritten = VAR_IN_PATTERN.replace_all(pattern, "(?P<$var>\\S+)");
    Regex::new(&rewritten).expect("output pattern must compile once $name$ markers are substituted")
}

#[derive(Debug, Default, Clone)]
pub struct CallResult {
    pub stdout: HashMap<String, String>,
    pub stderr: HashMap<String, String>,
}

#[derive(Debug)]
struct RunningState {
    pid: u32,
    descendants: Vec<u32>,
}

/// Owns the target executable, its callstring template, the prefix-wrapper
/// command (mutable — the executor can rewrite it mid-run), and the
/// compiled stdout/stderr capture patterns. Spawns the target, captures
/// output, and can kill the whole process tree on signal.
#[derive(Debug)]
pub struct ProgramCaller {
    path: PathBuf,
    callstring: Callstring,
    prefix_cmd: Mutex<Option<String>>,
    stdout_patterns: Vec<Regex>,
    stderr_patterns: Vec<Regex>,
    running: Mutex<Option<RunningState>>,
}

impl ProgramCaller {
    pub fn new(
        path: PathBuf,
        callstring: Callstring,
        prefix_cmd: Option<String>,
        stdout_patterns: &[String],
        stderr_patterns: &[String],
    ) -> Result<Self, ExecutableError> {
        validate_executable(&path)?;
        Ok(Self {
            path,
            callstring,
            prefix_cmd: Mutex::new(prefix_cmd),
            stdout_patterns: stdout_patterns.iter().map(|p| convert_pattern(p)).collect(),
            stderr_patterns: stderr_patterns.iter().map(|p| convert_pattern(p)).collect(),
            running: Mutex::new(None),
        })
    }

    pub fn set_prefix(&self, prefix_cmd: Option<String>) {
        *self.prefix_cmd.lock().unwrap() = prefix_cmd;
    }

    /// Runs the target once with `assignment`. If `cat` names a variable,
    /// that variable's file is decompression-sniffed, copied to a unique
    /// tempfile, and `assignment` is rewritten to point at the tempfile
    /// before rendering the callstring; the tempfile is removed before
    /// this call returns (on every path, via `Drop`).
    pub fn call(&self, mut assignment: HashMap<String, String>, cat: Option<&str>) -> Result<CallResult, CallError> {
        let _tempfile_guard;
        if let Some(cat_name) = cat {
            let source = assignment
                .get(cat_name)
                .ok_or_else(|| CallError::MissingCatVariable(cat_name.to_string()))?;
            let decompressed = compression::decompress_to_tempfile(Path::new(source))?;
            assignment.insert(cat_name.to_string(), decompressed.path().display().to_string());
            _tempfile_guard = Some(decompressed);
        } else {
            _tempfile_guard = None;
        }

        let rendered = self.callstring.assign(&assignment)?;
        let prefix = self.prefix_cmd.lock().unwrap().clone();

        let mut command_line = String::new();
        if let Some(prefix) = &prefix {
            command_line.push_str(prefix);
            command_line.push(' ');
        }
        command_line.push_str(&self.path.display().to_string());
        if !rendered.is_empty() {
            command_line.push(' ');
            command_line.push_str(&rendered);
        }

        let tokens = shlex::split(&command_line).ok_or_else(|| CallError::Shlex(command_line.clone()))?;
        let (program, args) = tokens.split_first().ok_or(CallError::EmptyCommand)?;

        let mut child = std::process::Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let pid = child.id();
        let descendants = list_children(pid);
        *self.running.lock().unwrap() = Some(RunningState { pid, descendants });

        let output = child.wait_with_output()?;
        *self.running.lock().unwrap() = None;
        // `_tempfile_guard` drops here, deleting the tempfile before
        // `call` returns, whether or not the spawn above succeeded.

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = CallResult::default();
        for pattern in &self.stdout_patterns {
            merge_captures(pattern, &stdout, &mut result.stdout);
        }
        for pattern in &self.stderr_patterns {
            merge_captures(pattern, &stderr, &mut result.stderr);
        }
        Ok(result)
    }

    /// Signals every recorded descendant PID plus the main child; no-op if
    /// nothing is currently running.
    pub fn kill(&self, signum: i32) {
        let Some(state) = self.running.lock().unwrap().take() else { return };
        for pid in state.descendants.iter().chain(std::iter::once(&state.pid)) {
            send_signal(*pid, signum);
        }
    }
}

fn merge_captures(pattern: &Regex, haystack: &str, into: &mut HashMap<String, String>) {
    let Some(captures) = pattern.captures(haystack) else { return };
    for name in pattern.capture_names().flatten() {
        if let Some(m) = captures.name(name) {
            into.insert(name.to_string(), m.as_str().to_string());
        }
    }
}

fn validate_executable(path: &Path) -> Result<(), ExecutableError> {
    if !path.exists() {
        return Err(ExecutableError::NotFound(path.display().to_string()));
    }
    if !path.is_file() {
        return Err(ExecutableError::NotAFile(path.display().to_string()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path).map(|m| m.permissions().mode()).unwrap_or(0);
        if mode & 0o111 == 0 {
            return Err(ExecutableError::NotExecutable(path.display().to_string()));
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn list_children(pid: u32) -> Vec<u32> {
    let path = format!("/proc/{pid}/task/{pid}/children");
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.split_whitespace().filter_map(|t| t.parse().ok()).collect())
        .unwrap_or_default()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn list_children(pid: u32) -> Vec<u32> {
    std::process::Command::new("pgrep")
        .arg("-P")
        .arg(pid.to_string())
        .output()
        .ok()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|l| l.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(not(unix))]
fn list_children(_pid: u32) -> Vec<u32> {
    Vec::new()
}

#[cfg(unix)]
fn send_signal(pid: u32, signum: i32) {
    unsafe {
        libc::kill(pid as i32, signum);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signum: i32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_pattern_builds_named_captures() {
        let re = convert_pattern("RESULT: $time$ ms, status $status$");
        let caps = re.captures("RESULT: 12.5 ms, status ok").unwrap();
        assert_eq!(&caps["time"], "12.5");
        assert_eq!(&caps["status"], "ok");
    }

    #[test]
    fn call_runs_true_and_reports_no_captures() {
        let callstring = Callstring::parse("", HashMap::new());
        let caller = ProgramCaller::new(PathBuf::from("/bin/true"), callstring, None, &[], &[]).unwrap();
        let result = caller.call(HashMap::new(), None).unwrap();
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn missing_executable_is_an_error() {
        let callstring = Callstring::parse("", HashMap::new());
        let err = ProgramCaller::new(PathBuf::from("/no/such/binary"), callstring, None, &[], &[]).unwrap_err();
        assert!(matches!(err, ExecutableError::NotFound(_)));
    }
}
