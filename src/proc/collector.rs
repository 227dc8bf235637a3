// src/proc/collector.rs

//! Asynchronous stdout/stderr capture.
//!
//! One reader task per stream pulls whatever bytes are currently available
//! and forwards them as chunk events; the runner loop republishes each chunk
//! to subscribers and appends it here. Chunks are raw reads, not lines: a
//! child that emits a progress bar without newlines still produces events.

use std::sync::Mutex;

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tracing::debug;

use crate::proc::ChildEvent;

const READ_CHUNK_SIZE: usize = 8192;

/// Append-only text buffers for the child's two output streams, plus the
/// last chunk received on each. Cleared at the start of every run so a
/// runner instance can be reused sequentially.
#[derive(Debug, Default)]
pub struct OutputCollector {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    last_stdout: Mutex<String>,
    last_stderr: Mutex<String>,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both buffers and the last-chunk slots.
    pub fn clear(&self) {
        self.stdout.lock().unwrap().clear();
        self.stderr.lock().unwrap().clear();
        self.last_stdout.lock().unwrap().clear();
        self.last_stderr.lock().unwrap().clear();
    }

    pub fn append_stdout(&self, chunk: &str) {
        self.stdout.lock().unwrap().push_str(chunk);
        *self.last_stdout.lock().unwrap() = chunk.to_string();
    }

    pub fn append_stderr(&self, chunk: &str) {
        self.stderr.lock().unwrap().push_str(chunk);
        *self.last_stderr.lock().unwrap() = chunk.to_string();
    }

    /// Accumulated stdout with leading/trailing whitespace trimmed.
    pub fn output(&self) -> String {
        self.stdout.lock().unwrap().trim().to_string()
    }

    /// Accumulated stderr with leading/trailing whitespace trimmed.
    pub fn error_output(&self) -> String {
        self.stderr.lock().unwrap().trim().to_string()
    }

    /// The most recent stdout chunk.
    pub fn last_stdout(&self) -> String {
        self.last_stdout.lock().unwrap().clone()
    }

    /// The most recent stderr chunk.
    pub fn last_stderr(&self) -> String {
        self.last_stderr.lock().unwrap().clone()
    }
}

/// Spawn one reader task per available stream, forwarding chunk events into
/// the runner loop. The tasks end at pipe EOF, which closes their channel
/// senders and lets the runner loop drain to completion.
pub fn spawn_readers(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    tx: mpsc::Sender<ChildEvent>,
) {
    if let Some(mut stream) = stdout {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        if tx.send(ChildEvent::Stdout(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "stdout read failed");
                        break;
                    }
                }
            }
        });
    }

    if let Some(mut stream) = stderr {
        tokio::spawn(async move {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        if tx.send(ChildEvent::Stderr(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "stderr read failed");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_accumulate_and_trim() {
        let collector = OutputCollector::new();
        collector.append_stdout("hello ");
        collector.append_stdout("world\n");
        collector.append_stderr("oops\n");

        assert_eq!(collector.output(), "hello world");
        assert_eq!(collector.error_output(), "oops");
        assert_eq!(collector.last_stdout(), "world\n");
        assert_eq!(collector.last_stderr(), "oops\n");
    }

    #[test]
    fn clear_resets_everything() {
        let collector = OutputCollector::new();
        collector.append_stdout("first run");
        collector.append_stderr("noise");
        collector.clear();

        assert_eq!(collector.output(), "");
        assert_eq!(collector.error_output(), "");
        assert_eq!(collector.last_stdout(), "");
    }

    #[tokio::test]
    async fn readers_forward_chunks_until_eof() {
        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg("printf out; printf err >&2")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        let mut child = command.spawn().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        spawn_readers(child.stdout.take(), child.stderr.take(), tx);

        let mut out = String::new();
        let mut err = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                ChildEvent::Stdout(chunk) => out.push_str(&chunk),
                ChildEvent::Stderr(chunk) => err.push_str(&chunk),
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert_eq!(out, "out");
        assert_eq!(err, "err");
        child.wait().await.unwrap();
    }
}
