//! External process invocation
//!
//! Every external collaborator (capture tool, uploader, network utilities)
//! is driven through this one narrow seam: run a command with arguments
//! under a wall-clock timeout and get back exit code, stdout and stderr.
//! A timeout kills the child and is an error; a non-zero exit is data,
//! because several collaborators are invoked best-effort.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::errors::ProcessError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a finished collaborator process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait ProcessRunner {
    /// Runs `program` to completion, enforcing `timeout`. Non-zero exit is
    /// returned as output, not an error.
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;

    /// Like [`ProcessRunner::run`], but a non-zero exit becomes an error.
    fn run_checked(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let output = self.run(program, args, timeout)?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProcessError::Failed {
                program: program.to_owned(),
                code: output.code,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }
}

/// Production runner backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        log::debug!("running `{} {}` (timeout {:?})", program, args.join(" "), timeout);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        // Drain the pipes on the side so a chatty child never fills its
        // pipe buffer and stalls behind the timeout loop.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        kill(&mut child);
                        join_drain(stdout);
                        join_drain(stderr);
                        return Err(ProcessError::Timeout {
                            program: program.to_owned(),
                            timeout_s: timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    kill(&mut child);
                    return Err(ProcessError::Wait {
                        program: program.to_owned(),
                        source,
                    });
                }
            }
        };

        Ok(ProcessOutput {
            code: status.code().unwrap_or(-1),
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = r.read_to_string(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
