//! Blocking execution of external tools with optional timeout
//!
//! Arguments are passed as `OsString`s so paths reach the tool byte-for-byte,
//! with no shell or glob interpretation in between.

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Output captured from a tool execution
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
}

impl ToolOutput {
    /// Everything the tool printed, stderr first
    pub fn transcript(&self) -> String {
        let mut text = self.stderr.trim_end().to_string();
        if !self.stdout.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(self.stdout.trim_end());
        }
        text
    }
}

/// Last non-empty line of a tool transcript, for one-line reports
pub fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Out,
    Err,
}

/// A builder for one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Kill the tool if it has not exited within `timeout`
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Arguments as given, for logging and tests
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion, capturing stdout and stderr
    ///
    /// The calling thread blocks until the tool exits. A non-zero exit is not
    /// an error here; callers inspect `status`. An expired timeout kills the
    /// child and returns `ErrorKind::TimedOut`.
    pub fn execute(&self) -> io::Result<ToolOutput> {
        trace!("Running {} {:?}", self.program.display(), self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Both pipes are drained on their own threads so a chatty tool can
        // never block on a full pipe while we wait for the other one.
        let (tx, rx) = bounded::<(Stream, Vec<u8>)>(2);
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(pipe, Stream::Out, tx.clone());
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(pipe, Stream::Err, tx.clone());
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            let received = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((Stream::Out, bytes)) => stdout = bytes,
                Ok((Stream::Err, bytes)) => stderr = bytes,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let timeout = self.timeout.unwrap_or_default();
                    debug!(
                        "{} killed after {:.1}s",
                        self.program.display(),
                        timeout.as_secs_f64()
                    );
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("timed out after {}s", timeout.as_secs()),
                    ));
                }
            }
        }

        let status = child.wait()?;

        Ok(ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn spawn_reader<R>(mut pipe: R, stream: Stream, tx: crossbeam_channel::Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        // Receiver is gone after a timeout; nothing left to deliver to
        let _ = tx.send((stream, buf));
    });
}
