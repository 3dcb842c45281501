//! Process-boundary probe for external attention kernels.
//!
//! One probe invocation stages a serialized workload into a scoped
//! temporary file, runs `executable <concurrency>` with that file as
//! stdin, drains stdout and stderr fully, and parses the first stdout
//! line as the kernel's self-reported latency. Kernel misbehavior is data
//! (a tagged [`Measurement::Failed`]), not an error: a sweep must keep
//! going when one probe goes wrong. Only resource acquisition fails hard.

use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MedirError, Result};

/// Poll interval while waiting on a probed process under a deadline.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Mean-term contributed by a failed probe (see [`Measurement::as_mean_term`]).
pub const FAILURE_SENTINEL: f64 = -1.0;

/// Why a probe produced no usable latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailure {
    /// Process exited with a non-zero status or was killed by a signal.
    NonZeroExit {
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// First line of stderr, kept for diagnostics
        stderr_head: String,
    },
    /// First stdout line was missing or not an integer.
    Unparseable {
        /// The offending first line (empty if the kernel wrote nothing)
        first_line: String,
    },
    /// The process outlived the configured deadline and was killed.
    TimedOut {
        /// The deadline that expired, in milliseconds
        limit_ms: u64,
    },
}

/// One probe outcome: a self-reported latency or a tagged failure.
///
/// An in-band `-1` sentinel would conflate "failed" with a latency of -1;
/// the tagged form keeps the failure reason while `as_mean_term` preserves
/// the sentinel averaging policy downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurement {
    /// Latency from the first stdout line (time unit owned by the kernel).
    Latency(i64),
    /// Probe failed; carried through aggregation as the sentinel term.
    Failed(ProbeFailure),
}

impl Measurement {
    /// Value this measurement contributes to an arithmetic mean.
    ///
    /// Failures contribute `-1.0` and are averaged in rather than
    /// excluded, so every row of a sweep reflects the same trial count. A
    /// row mean below zero is the signal that at least one probe failed.
    #[must_use]
    pub fn as_mean_term(&self) -> f64 {
        match self {
            Self::Latency(latency) => *latency as f64,
            Self::Failed(_) => FAILURE_SENTINEL,
        }
    }

    /// True when the probe produced a usable latency.
    #[must_use]
    pub fn is_latency(&self) -> bool {
        matches!(self, Self::Latency(_))
    }
}

/// Capability to run one probe against an attention kernel.
///
/// The external executable enters the harness only through this seam, so
/// aggregation and sweeps are testable without a real binary.
pub trait ProbeRunner: Send + Sync {
    /// Invoke the kernel once with `payload` on stdin and the given
    /// concurrency argument.
    ///
    /// # Errors
    ///
    /// Fails only on resource acquisition (temp staging, process spawn);
    /// kernel misbehavior comes back as [`Measurement::Failed`].
    fn invoke(&self, payload: &[u8], concurrency: u32) -> Result<Measurement>;
}

/// Probe that shells out to an external kernel executable.
pub struct CommandProbe {
    executable: PathBuf,
    scratch_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandProbe {
    /// Create a probe for the given executable.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            scratch_dir: None,
            timeout: None,
        }
    }

    /// Stage temp inputs inside `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Kill the kernel and report [`ProbeFailure::TimedOut`] if it runs
    /// past `limit`. Without a deadline the probe blocks until exit.
    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Write the payload to a scoped temp file; released when dropped.
    fn stage_payload(&self, payload: &[u8]) -> Result<NamedTempFile> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("medir-input-");
            b
        };
        let mut staged = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|source| MedirError::WorkloadStage { source })?;

        staged
            .write_all(payload)
            .map_err(|source| MedirError::WorkloadStage { source })?;
        staged
            .flush()
            .map_err(|source| MedirError::WorkloadStage { source })?;
        Ok(staged)
    }

    /// Wait for the child, draining stdout/stderr on reader threads so a
    /// kernel that prints its full result matrix cannot fill the pipe and
    /// wedge. `None` status means the deadline expired and the child was
    /// killed.
    fn collect(&self, mut child: Child) -> std::io::Result<(Option<ExitStatus>, Vec<u8>, Vec<u8>)> {
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match self.timeout {
            None => Some(child.wait()?),
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break Some(status);
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                    thread::sleep(WAIT_POLL);
                }
            },
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        Ok((status, stdout, stderr))
    }

    /// Turn captured process output into a measurement.
    fn interpret(
        status: Option<ExitStatus>,
        stdout: &[u8],
        stderr: &[u8],
        timeout: Option<Duration>,
    ) -> Measurement {
        let Some(status) = status else {
            let limit_ms = timeout.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            return Measurement::Failed(ProbeFailure::TimedOut { limit_ms });
        };

        if !status.success() {
            let stderr_head = String::from_utf8_lossy(stderr)
                .lines()
                .next()
                .unwrap_or("")
                .to_string();
            return Measurement::Failed(ProbeFailure::NonZeroExit {
                code: status.code(),
                stderr_head,
            });
        }

        let text = String::from_utf8_lossy(stdout);
        let first_line = text.lines().next().unwrap_or("").trim();
        match first_line.parse::<i64>() {
            Ok(latency) => Measurement::Latency(latency),
            Err(_) => Measurement::Failed(ProbeFailure::Unparseable {
                first_line: first_line.to_string(),
            }),
        }
    }
}

impl ProbeRunner for CommandProbe {
    fn invoke(&self, payload: &[u8], concurrency: u32) -> Result<Measurement> {
        // `staged` lives until this function returns, so the temp file is
        // released on every path, parse failures included.
        let staged = self.stage_payload(payload)?;
        let stdin = staged
            .reopen()
            .map_err(|source| MedirError::WorkloadStage { source })?;

        let command = self.executable.display().to_string();
        let child = Command::new(&self.executable)
            .arg(concurrency.to_string())
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MedirError::ProbeLaunch {
                command: command.clone(),
                source,
            })?;

        let (status, stdout, stderr) = self
            .collect(child)
            .map_err(|source| MedirError::ProbeLaunch { command, source })?;

        Ok(Self::interpret(status, &stdout, &stderr, self.timeout))
    }
}

/// Drain a pipe to completion on its own thread.
fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}

/// Scripted probe for tests and dry runs: replays a fixed measurement
/// sequence (cycling) without touching any external process.
pub struct StubProbe {
    script: Vec<Measurement>,
    calls: AtomicUsize,
    seen_concurrency: Mutex<Vec<u32>>,
}

impl StubProbe {
    /// Probe that always reports the same latency.
    #[must_use]
    pub fn constant(latency: i64) -> Self {
        Self::sequence(vec![Measurement::Latency(latency)])
    }

    /// Probe whose every invocation fails with unparseable output.
    #[must_use]
    pub fn failing() -> Self {
        Self::sequence(vec![Measurement::Failed(ProbeFailure::Unparseable {
            first_line: String::new(),
        })])
    }

    /// Probe replaying `script` in order, cycling when exhausted.
    ///
    /// # Panics
    ///
    /// Panics on an empty script; a stub with nothing to say is a test bug.
    #[must_use]
    pub fn sequence(script: Vec<Measurement>) -> Self {
        assert!(!script.is_empty(), "stub script must not be empty");
        Self {
            script,
            calls: AtomicUsize::new(0),
            seen_concurrency: Mutex::new(Vec::new()),
        }
    }

    /// How many times `invoke` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Concurrency arguments observed, in invocation order.
    #[must_use]
    pub fn seen_concurrency(&self) -> Vec<u32> {
        self.seen_concurrency
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl ProbeRunner for StubProbe {
    fn invoke(&self, _payload: &[u8], concurrency: u32) -> Result<Measurement> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut seen) = self.seen_concurrency.lock() {
            seen.push(concurrency);
        }
        Ok(self.script[call % self.script.len()].clone())
    }
}
