//! External process execution
//!
//! A [`ProcessRequest`] describes one program invocation. Running it drains
//! stdout and stderr on two concurrent readers, so a child blocking on a full
//! pipe cannot stall the other stream, and returns once both streams hit EOF
//! and the process has exited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Number of trailing stderr lines kept in a failure message
const STDERR_TAIL_LINES: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed reading output of {program}: {source}")]
    Output {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// An external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    program: String,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
}

/// Output of a process that exited successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessRequest {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Adds an environment override on top of the inherited environment
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the process to completion
    ///
    /// A non-zero exit is an error carrying the tail of stderr.
    pub async fn run(self) -> Result<ProcessOutput, ProcessError> {
        debug!("Running {} {:?} in {:?}", self.program, self.args, self.dir);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let program = self.program.as_str();

        let (stdout, stderr, status) = tokio::join!(
            drain_lines(program, "stdout", stdout),
            drain_lines(program, "stderr", stderr),
            child.wait(),
        );

        let output_error = |source| ProcessError::Output {
            program: self.program.clone(),
            source,
        };
        let output = ProcessOutput {
            stdout: stdout.map_err(output_error)?,
            stderr: stderr.map_err(output_error)?,
        };
        let status = status.map_err(output_error)?;

        if !status.success() {
            let tail_start = output.stderr.len().saturating_sub(STDERR_TAIL_LINES);
            return Err(ProcessError::Failed {
                program: self.program.clone(),
                status,
                stderr: output.stderr[tail_start..].join("\n"),
            });
        }

        Ok(output)
    }
}

async fn drain_lines<R>(
    program: &str,
    stream: &str,
    reader: Option<R>,
) -> Result<Vec<String>, std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };

    // output is not guaranteed to be UTF-8 (author names, localized
    // compiler messages), so lines are decoded lossily
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = Vec::new();
    while reader.read_until(b'\n', &mut buf).await? > 0 {
        let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let line = String::from_utf8_lossy(bytes).into_owned();
        debug!("{} {}: {}", program, stream, line);
        captured.push(line);
        buf.clear();
    }
    Ok(captured)
}
