use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_MSIANALYZER_BIN: &str = "msianalyzer";
const MSIANALYZER_ENV_BIN: &str = "MSIWEB_MSIANALYZER_BIN";

/// Primary run-marker invocations get an hour; pileup plotting half that.
pub const RUN_MARKER_TIMEOUT_SECS: u64 = 3600;
pub const PILEUP_TIMEOUT_SECS: u64 = 1800;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a completed analyzer invocation. A nonzero exit code
/// is a normal outcome here; diagnostics and partial artifacts may still be
/// on disk and callers are expected to inventory them regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
pub enum AnalyzerError {
    ToolNotFound {
        executable: String,
    },
    Timeout {
        executable: String,
        seconds: u64,
    },
    Io {
        message: String,
    },
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound { executable } => write!(
                f,
                "Could not find msianalyzer executable '{}'. Install MSIanalyzer or set {}",
                executable, MSIANALYZER_ENV_BIN
            ),
            Self::Timeout {
                executable,
                seconds,
            } => write!(
                f,
                "msianalyzer run timed out after {seconds} seconds (executable '{executable}')"
            ),
            Self::Io { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AnalyzerError {}

/// Name of the analyzer executable, overridable via environment.
pub fn analyzer_executable() -> String {
    std::env::var(MSIANALYZER_ENV_BIN)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_MSIANALYZER_BIN.to_string())
}

/// Options of the primary `run-marker` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMarkerOptions {
    pub run_tests: bool,
    pub skip_variant_summary: bool,
    pub threads: u32,
}

impl Default for RunMarkerOptions {
    fn default() -> Self {
        Self {
            run_tests: false,
            skip_variant_summary: false,
            threads: 1,
        }
    }
}

/// Argument vector for `msianalyzer run-marker`, without the executable.
/// `--threads` is only appended when more than one thread is requested.
pub fn run_marker_command(
    marker: &str,
    manifest_path: &Path,
    options: &RunMarkerOptions,
) -> Vec<String> {
    let mut args = vec![
        "run-marker".to_string(),
        marker.to_string(),
        manifest_path.to_string_lossy().into_owned(),
    ];
    if options.run_tests {
        args.push("--run-tests".to_string());
    }
    if options.skip_variant_summary {
        args.push("--skip-variant-summary".to_string());
    }
    if options.threads > 1 {
        args.push("--threads".to_string());
        args.push(options.threads.to_string());
    }
    args
}

/// Argument vector for `msianalyzer pileup`, without the executable.
pub fn pileup_command(fastq_path: &Path, reference_path: &Path) -> Vec<String> {
    vec![
        "pileup".to_string(),
        fastq_path.to_string_lossy().into_owned(),
        reference_path.to_string_lossy().into_owned(),
    ]
}

/// Run the analyzer with the given argument vector, the workspace root as
/// working directory, and a hard deadline. Blocks until the process exits,
/// the deadline passes (the process is killed, no outcome is returned, and
/// whatever it already wrote stays in the workspace), or the executable
/// turns out to be missing.
pub fn invoke(
    executable: &str,
    args: &[String],
    working_dir: &Path,
    timeout: Duration,
) -> Result<ProcessOutcome, AnalyzerError> {
    let mut child = Command::new(executable)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AnalyzerError::ToolNotFound {
                    executable: executable.to_string(),
                }
            } else {
                AnalyzerError::Io {
                    message: format!(
                        "Could not run msianalyzer executable '{}' with args [{}]: {}",
                        executable,
                        args.join(" "),
                        e
                    ),
                }
            }
        })?;

    // Both pipes must be drained while waiting: a run writing more than the
    // pipe buffer would otherwise block and never reach the deadline check.
    let stdout_reader = spawn_pipe_reader(child.stdout.take());
    let stderr_reader = spawn_pipe_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    // The readers are not joined here: a grandchild process
                    // surviving the kill could hold the pipes open. They end
                    // on their own at pipe EOF.
                    return Err(AnalyzerError::Timeout {
                        executable: executable.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalyzerError::Io {
                    message: format!("Could not wait for msianalyzer process: {e}"),
                });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(ProcessOutcome {
        stdout,
        stderr,
        // Termination by signal carries no exit code; report -1.
        exit_code: status.code().unwrap_or(-1),
    })
}

fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[cfg(unix)]
    fn write_stub_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("msianalyzer_stub.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_run_marker_command_minimal() {
        let args = run_marker_command(
            "BAT25",
            Path::new("/work/manifest_runtime.json"),
            &RunMarkerOptions::default(),
        );
        assert_eq!(args, vec!["run-marker", "BAT25", "/work/manifest_runtime.json"]);
    }

    #[test]
    fn test_run_marker_command_with_flags() {
        let options = RunMarkerOptions {
            run_tests: true,
            skip_variant_summary: true,
            threads: 4,
        };
        let args = run_marker_command("BAT26", Path::new("m.json"), &options);
        assert_eq!(
            args,
            vec![
                "run-marker",
                "BAT26",
                "m.json",
                "--run-tests",
                "--skip-variant-summary",
                "--threads",
                "4"
            ]
        );
    }

    #[test]
    fn test_run_marker_command_single_thread_omits_flag() {
        let options = RunMarkerOptions {
            threads: 1,
            ..RunMarkerOptions::default()
        };
        let args = run_marker_command("BAT25", Path::new("m.json"), &options);
        assert!(!args.contains(&"--threads".to_string()));
    }

    #[test]
    fn test_pileup_command() {
        let args = pileup_command(
            Path::new("/w/fastq/S_1.fastq"),
            Path::new("/refs/BAT25_chr4.fa"),
        );
        assert_eq!(args, vec!["pileup", "/w/fastq/S_1.fastq", "/refs/BAT25_chr4.fa"]);
    }

    #[test]
    fn test_invoke_missing_tool() {
        let td = tempdir().unwrap();
        let err = invoke(
            "msianalyzer-does-not-exist",
            &["run-marker".to_string()],
            td.path(),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_invoke_captures_outcome_in_working_dir() {
        let td = tempdir().unwrap();
        let tool = write_stub_tool(
            td.path(),
            "echo produced > results.txt\necho analyzer done\necho warn >&2\nexit 0\n",
        );
        let workspace = td.path().join("work");
        fs::create_dir_all(&workspace).unwrap();

        let outcome = invoke(
            &tool.to_string_lossy(),
            &["run-marker".to_string(), "BAT25".to_string()],
            &workspace,
            Duration::from_secs(30),
        )
        .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.stdout.trim(), "analyzer done");
        assert_eq!(outcome.stderr.trim(), "warn");
        // The stub ran with the workspace as current directory.
        assert!(workspace.join("results.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_invoke_nonzero_exit_is_an_outcome() {
        let td = tempdir().unwrap();
        let tool = write_stub_tool(td.path(), "echo broken >&2\nexit 3\n");

        let outcome = invoke(
            &tool.to_string_lossy(),
            &[],
            td.path(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stderr.trim(), "broken");
    }

    #[cfg(unix)]
    #[test]
    fn test_invoke_timeout_kills_and_keeps_partial_artifacts() {
        let td = tempdir().unwrap();
        let tool = write_stub_tool(td.path(), "echo partial > partial.txt\nexec sleep 30\n");

        let err = invoke(
            &tool.to_string_lossy(),
            &[],
            td.path(),
            Duration::from_millis(300),
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::Timeout { .. }));
        // Whatever the run wrote before the deadline stays discoverable.
        assert!(td.path().join("partial.txt").is_file());
    }

    #[test]
    fn test_analyzer_executable_default() {
        // Only meaningful when the override is not set in the environment.
        if std::env::var(MSIANALYZER_ENV_BIN).is_err() {
            assert_eq!(analyzer_executable(), DEFAULT_MSIANALYZER_BIN);
        }
    }
}
