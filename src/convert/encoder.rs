use crate::error::{MediaError, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

/// Bytes kept from each output stream; older output is discarded.
const DIAGNOSTIC_TAIL: usize = 64 * 1024;
/// Consecutive read errors after which a pipe is abandoned.
const MAX_FAILED_READS: usize = 8;

#[derive(Debug, Clone)]
pub struct EncoderOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl EncoderOutput {
    pub fn diagnostics(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        if !self.stdout.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(self.stdout.trim());
        }
        text
    }
}

/// Runs `<program> <input> <output>` as a child process.
///
/// Both pipes are drained while the child runs, and the child is killed and
/// reaped on timeout or whenever the owning future is dropped.
#[derive(Debug, Clone)]
pub struct ExternalEncoder {
    program: OsString,
    timeout: Duration,
}

impl ExternalEncoder {
    pub fn new<P: Into<OsString>>(program: P) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Blocking entry point for converter threads.
    pub fn encode(&self, input: &Path, output: &Path) -> Result<EncoderOutput> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.encode_async(input, output)))
            }
            // A current-thread runtime cannot be blocked from inside, so the
            // child is driven from a helper thread instead.
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.encode_on_own_runtime(input, output))
                    .join()
                    .unwrap_or_else(|_| {
                        Err(MediaError::Encoder {
                            program: self.program(),
                            message: "encoder driver thread panicked".to_string(),
                            diagnostics: String::new(),
                        })
                    })
            }),
            Err(_) => self.encode_on_own_runtime(input, output),
        }
    }

    fn encode_on_own_runtime(&self, input: &Path, output: &Path) -> Result<EncoderOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.encode_async(input, output))
    }

    pub async fn encode_async(&self, input: &Path, output: &Path) -> Result<EncoderOutput> {
        let started = Instant::now();
        debug!(
            "Running {} {} {}",
            self.program(),
            input.display(),
            output.display()
        );

        let mut child = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::Encoder {
                program: self.program(),
                message: format!("failed to launch: {}", e),
                diagnostics: String::new(),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let wait = child.wait();

        let finished =
            tokio::time::timeout(self.timeout, async move { tokio::join!(wait, stdout, stderr) })
                .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result,
            Err(_) => {
                // kill() also reaps the child
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill timed out encoder: {}", e);
                }
                return Err(MediaError::EncoderTimeout {
                    program: self.program(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let status = status.map_err(|e| MediaError::Encoder {
            program: self.program(),
            message: format!("failed to wait for process: {}", e),
            diagnostics: String::new(),
        })?;

        let output = EncoderOutput {
            stdout,
            stderr,
            elapsed: started.elapsed(),
        };
        debug!("{} finished with {}: {}", self.program(), status, output.diagnostics());

        if status.success() {
            Ok(output)
        } else {
            Err(MediaError::Encoder {
                program: self.program(),
                message: format!("exited with {}", status),
                diagnostics: output.diagnostics(),
            })
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut pipe = match pipe {
        Some(pipe) => pipe,
        None => return String::new(),
    };

    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut failed_reads = 0;
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                failed_reads += 1;
                warn!("Reading encoder output failed: {}", e);
                if failed_reads >= MAX_FAILED_READS {
                    break;
                }
            }
            Ok(n) => {
                failed_reads = 0;
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > DIAGNOSTIC_TAIL {
                    let excess = kept.len() - DIAGNOSTIC_TAIL;
                    kept.drain(..excess);
                }
            }
        }
    }

    String::from_utf8_lossy(&kept).into_owned()
}
