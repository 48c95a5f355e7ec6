//! External process execution

use std::fmt;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Failures that prevented a process from running to a normal exit
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable could not be found
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The process was killed by a signal before exiting
    #[error("`{program}` terminated by signal {}", describe_signal(.signal))]
    Terminated { program: String, signal: Option<i32> },

    /// Spawning or talking to the process failed
    #[error("failed to run `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub input: Option<Vec<u8>>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            envs: Vec::new(),
        }
    }

    /// Bytes written to the process' stdin before it is closed
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_envs(mut self, envs: Vec<(String, String)>) -> Self {
        self.envs = envs;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }

    /// Text describing a failure, preferring stderr
    pub fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Runs external processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the invocation to completion. A non-zero exit is not an error.
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Process runner backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        debug!("Running: {}", invocation);

        let program = invocation.program.clone();
        let io_err = |source: std::io::Error| ProcessError::Io {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ProcessError::NotFound {
                    program: invocation.program.clone(),
                },
                _ => io_err(e),
            })?;

        // Feed stdin concurrently with draining the output pipes so a chatty
        // process cannot block on a full pipe while we are still writing.
        let stdin = child.stdin.take();
        let input = invocation.input.clone();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Some(input) = input {
                    stdin.write_all(&input).await?;
                }
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let output = child.wait_with_output().await.map_err(io_err)?;

        match writer.await {
            Ok(Ok(())) => {}
            // The process may exit without reading its input; its exit status says more.
            Ok(Err(e)) => warn!("Failed to write stdin of `{}`: {}", invocation.program, e),
            Err(e) => warn!("Stdin writer for `{}` panicked: {}", invocation.program, e),
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(program = %invocation.program, "{}", line);
        }

        let status = exit_code(&invocation.program, output.status)?;
        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        })
    }
}

fn describe_signal(signal: &Option<i32>) -> String {
    signal
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn exit_code(program: &str, status: ExitStatus) -> Result<i32, ProcessError> {
    if let Some(code) = status.code() {
        return Ok(code);
    }

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Err(ProcessError::Terminated {
        program: program.to_string(),
        signal,
    })
}
