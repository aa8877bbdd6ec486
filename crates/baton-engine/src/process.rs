//! Single external-program invocation with timeout, stream logging,
//! and capture/echo policies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use baton_core::error::{BatonError, Result};

/// Exit code reported when the command cannot be located.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the invocation hits its timeout.
pub const EXIT_TIMEOUT: i32 = 124;

/// Per-stream behavior for one invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamPolicy {
    /// Buffer the stream's bytes into the returned result.
    pub capture: bool,
    /// Echo the stream's bytes live to the caller's matching stream.
    pub echo: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub command: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
    pub stdout: StreamPolicy,
    pub stderr: StreamPolicy,
}

#[derive(Debug)]
pub struct ProcessOutput {
    /// Captured stdout bytes (empty when capture is disabled).
    pub stdout: Vec<u8>,
    /// Captured stderr bytes (empty when capture is disabled).
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub duration: Duration,
}

/// Run one program to completion (or timeout).
///
/// Every byte of both streams is always appended to `stdout.log` /
/// `stderr.log` under `log_dir`, regardless of the capture policy. Stream
/// pumping runs concurrently with the process wait, but the call returns
/// only after the child has exited or been killed.
pub async fn run(req: &ProcessRequest, log_dir: &Path) -> Result<ProcessOutput> {
    tokio::fs::create_dir_all(log_dir).await?;
    let stdout_path = log_dir.join("stdout.log");
    let stderr_path = log_dir.join("stderr.log");

    let start = Instant::now();
    let mut child = match Command::new(&req.command)
        .args(&req.args)
        .current_dir(&req.workdir)
        .envs(&req.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let message = format!("command not found: {}\n", req.command);
            warn!(command = %req.command, "failed to start process");
            tokio::fs::write(&stdout_path, b"").await?;
            tokio::fs::write(&stderr_path, message.as_bytes()).await?;
            return Ok(ProcessOutput {
                stdout: Vec::new(),
                stderr: if req.stderr.capture {
                    message.into_bytes()
                } else {
                    Vec::new()
                },
                exit_code: EXIT_NOT_FOUND,
                duration: start.elapsed(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(payload) = &req.stdin {
            stdin.write_all(payload.as_bytes()).await?;
        }
        // dropping closes the pipe
    }

    let stdout_task = spawn_pump(
        child.stdout.take(),
        stdout_path,
        req.stdout,
        EchoSink::Stdout,
    );
    let stderr_task = spawn_pump(
        child.stderr.take(),
        stderr_path,
        req.stderr,
        EchoSink::Stderr,
    );

    let mut timed_out = false;
    let status = match req.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                timed_out = true;
                debug!(command = %req.command, timeout = ?limit, "process timed out, killing");
                child.start_kill().ok();
                child.wait().await?
            }
        },
        None => child.wait().await?,
    };

    let stdout_pump = join_pump(stdout_task).await?;
    let stderr_pump = join_pump(stderr_task).await?;

    if req.stdout.echo && stdout_pump.wrote && stdout_pump.last_byte != b'\n' {
        EchoSink::Stdout.write(b"\n").await?;
    }
    if req.stderr.echo && stderr_pump.wrote && stderr_pump.last_byte != b'\n' {
        EchoSink::Stderr.write(b"\n").await?;
    }

    let exit_code = if timed_out {
        EXIT_TIMEOUT
    } else {
        status.code().unwrap_or(1)
    };

    Ok(ProcessOutput {
        stdout: stdout_pump.captured,
        stderr: stderr_pump.captured,
        exit_code,
        duration: start.elapsed(),
    })
}

#[derive(Default)]
struct PumpResult {
    captured: Vec<u8>,
    wrote: bool,
    last_byte: u8,
}

#[derive(Clone, Copy)]
enum EchoSink {
    Stdout,
    Stderr,
}

impl EchoSink {
    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(bytes).await?;
                out.flush().await
            }
            Self::Stderr => {
                let mut out = tokio::io::stderr();
                out.write_all(bytes).await?;
                out.flush().await
            }
        }
    }
}

fn spawn_pump<R>(
    reader: Option<R>,
    log_path: PathBuf,
    policy: StreamPolicy,
    sink: EchoSink,
) -> JoinHandle<std::io::Result<PumpResult>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut result = PumpResult::default();
        let mut log = tokio::fs::File::create(&log_path).await?;
        let Some(mut reader) = reader else {
            return Ok(result);
        };
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            log.write_all(chunk).await?;
            if policy.capture {
                result.captured.extend_from_slice(chunk);
            }
            if policy.echo {
                if !result.wrote {
                    // one leading newline before the first echoed byte
                    sink.write(b"\n").await?;
                }
                sink.write(chunk).await?;
            }
            result.wrote = true;
            result.last_byte = chunk[n - 1];
        }
        log.flush().await?;
        Ok(result)
    })
}

async fn join_pump(task: JoinHandle<std::io::Result<PumpResult>>) -> Result<PumpResult> {
    match task.await {
        Ok(result) => Ok(result?),
        Err(e) => Err(BatonError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            e,
        ))),
    }
}
