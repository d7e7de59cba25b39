//! Running a single process invocation and streaming its output.

use std::future::Future;
use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::system::Invocation;

const READ_CHUNK: usize = 8 * 1024;

/// Errors from running one process.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The program could not be started at all.
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// Reading output or waiting on the child failed.
  #[error("io error while running {program}: {source}")]
  Io {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The process ran and exited unsuccessfully. `code` is `None` when killed by a signal.
  #[error("command failed with exit code {code:?}: {program}")]
  Failed { program: String, code: Option<i32> },
}

/// Receives raw output bytes as a process produces them.
pub trait OutputSink {
  fn write(&mut self, bytes: &[u8]);
}

impl OutputSink for Vec<u8> {
  fn write(&mut self, bytes: &[u8]) {
    self.extend_from_slice(bytes);
  }
}

/// Runs invocations to completion.
///
/// Standard output and standard error are both delivered to `sink`, in the
/// order they arrive. Anything other than a zero exit status is an error.
pub trait ProcessRunner {
  fn run(&self, invocation: &Invocation, sink: &mut dyn OutputSink) -> impl Future<Output = Result<(), ProcessError>>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
  fn run(&self, invocation: &Invocation, sink: &mut dyn OutputSink) -> impl Future<Output = Result<(), ProcessError>> {
    (**self).run(invocation, sink)
  }
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
  async fn run(&self, invocation: &Invocation, sink: &mut dyn OutputSink) -> Result<(), ProcessError> {
    let program = invocation.program.clone();
    let io_err = |source: io::Error| ProcessError::Io {
      program: program.clone(),
      source,
    };

    debug!(command = %invocation, "spawning process");

    let mut child = Command::new(&invocation.program)
      .args(&invocation.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
      })?;

    let mut stdout = child
      .stdout
      .take()
      .ok_or_else(|| io_err(io::Error::other("stdout was not piped")))?;
    let mut stderr = child
      .stderr
      .take()
      .ok_or_else(|| io_err(io::Error::other("stderr was not piped")))?;

    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    // Drain both pipes concurrently so a chatty stderr cannot block stdout.
    while out_open || err_open {
      tokio::select! {
        read = stdout.read(&mut out_buf), if out_open => match read.map_err(io_err)? {
          0 => out_open = false,
          n => sink.write(&out_buf[..n]),
        },
        read = stderr.read(&mut err_buf), if err_open => match read.map_err(io_err)? {
          0 => err_open = false,
          n => sink.write(&err_buf[..n]),
        },
      }
    }

    let status = child.wait().await.map_err(io_err)?;
    debug!(program = %program, code = ?status.code(), "process exited");

    if status.success() {
      Ok(())
    } else {
      Err(ProcessError::Failed {
        program,
        code: status.code(),
      })
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;

  fn sh(script: &str) -> Invocation {
    Invocation::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
  }

  #[tokio::test]
  async fn captures_stdout() {
    let mut out = Vec::new();

    TokioProcessRunner.run(&sh("echo hello"), &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
  }

  #[tokio::test]
  async fn merges_stderr_into_sink() {
    let mut out = Vec::new();

    TokioProcessRunner
      .run(&sh("echo to-out; echo to-err >&2"), &mut out)
      .await
      .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("to-out"));
    assert!(text.contains("to-err"));
  }

  #[tokio::test]
  async fn nonzero_exit_is_failure_with_code() {
    let mut out = Vec::new();

    let err = TokioProcessRunner
      .run(&sh("echo partial; exit 3"), &mut out)
      .await
      .unwrap_err();

    assert!(matches!(err, ProcessError::Failed { code: Some(3), .. }));
    assert_eq!(out, b"partial\n");
  }

  #[tokio::test]
  async fn missing_program_is_spawn_error() {
    let mut out = Vec::new();
    let invocation = Invocation::new("/definitely/not/a/real/program", vec![]);

    let err = TokioProcessRunner.run(&invocation, &mut out).await.unwrap_err();

    assert!(matches!(err, ProcessError::Spawn { .. }));
  }

  #[tokio::test]
  async fn large_output_is_fully_drained() {
    let mut out = Vec::new();

    TokioProcessRunner
      .run(&sh("i=0; while [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done"), &mut out)
      .await
      .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2000);
    assert!(text.ends_with("line-1999\n"));
  }
}
