// src/fifo/channel.rs

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use nix::fcntl::OFlag;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::runner::RunnerEvent;

/// Duplex channel over a pre-existing FIFO (or regular file).
///
/// The backing file is opened read/write and non-blocking: read/write on a
/// FIFO must not stall the runner when the other side is absent. A `notify`
/// watcher on the path drives incoming reads; the watcher is kept alive for
/// as long as the channel is connected, and dropping the channel stops
/// watching and closes the file.
pub struct FifoChannel {
    path: PathBuf,
    file: Arc<Mutex<File>>,
    suppressed: Arc<AtomicU64>,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for FifoChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoChannel")
            .field("path", &self.path)
            .field("suppressed", &self.suppressed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl FifoChannel {
    /// Open `path` for read/write and start watching it for external changes.
    ///
    /// The path must already exist; this never creates it. Change events are
    /// republished as [`RunnerEvent::FifoChangeAvailable`] on `events_tx`.
    pub fn connect(path: &Path, events_tx: mpsc::UnboundedSender<RunnerEvent>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)?;
        let file = Arc::new(Mutex::new(file));
        let suppressed = Arc::new(AtomicU64::new(0));

        // Channel from the blocking notify callback into the async world.
        let (change_tx, mut change_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if change_tx.send(event).is_err() {
                        // We can't log via tracing here easily, so fallback to stderr.
                        eprintln!("runtick: failed to forward fifo notify event");
                    }
                }
                Err(err) => {
                    eprintln!("runtick: fifo watch error: {err}");
                }
            },
            Config::default(),
        )?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;

        // Async task that consumes change notifications and republishes
        // non-empty reads.
        let task_file = Arc::clone(&file);
        let task_suppressed = Arc::clone(&suppressed);
        let task_path = path.to_path_buf();
        tokio::spawn(async move {
            while let Some(event) = change_rx.recv().await {
                debug!(?event, "fifo change notification");

                if consume_suppression(&task_suppressed) {
                    // Our own write; only external writers produce reads.
                    continue;
                }

                let text = {
                    let mut file = task_file.lock().unwrap();
                    drain_to_string(&mut file)
                };
                if !text.is_empty() {
                    let _ = events_tx.send(RunnerEvent::FifoChangeAvailable(text));
                }
            }
            debug!(path = ?task_path, "fifo watch loop finished");
        });

        info!(path = ?path, "fifo channel connected");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            suppressed,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write UTF-8 text plus a trailing newline, flushed.
    ///
    /// The change notification produced by this write is suppressed so the
    /// channel never reacts to it as if it were an external message. If the
    /// backing path no longer exists the write is dropped with a log line.
    pub fn write(&self, text: &str) {
        if !self.path.exists() {
            debug!(path = ?self.path, "fifo path no longer exists; dropping write");
            return;
        }

        self.suppressed.fetch_add(1, Ordering::SeqCst);

        // One write call per message so the suppression counter matches the
        // change notifications the write produces.
        let mut payload = Vec::with_capacity(text.len() + 1);
        payload.extend_from_slice(text.as_bytes());
        payload.push(b'\n');

        let mut file = self.file.lock().unwrap();
        let write = file.write_all(&payload).and_then(|()| file.flush());
        if let Err(err) = write {
            debug!(path = ?self.path, error = %err, "fifo write failed");
        }
    }
}

impl Drop for FifoChannel {
    fn drop(&mut self) {
        debug!(path = ?self.path, "fifo channel disconnected");
    }
}

/// Decrement the suppression counter if positive. Returns whether a
/// suppression was consumed (i.e. this notification came from our own write).
fn consume_suppression(counter: &AtomicU64) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Read everything currently available, from the start where possible.
///
/// Regular files are re-read from the beginning; real FIFOs reject the seek,
/// which is ignored, and the non-blocking read then drains whatever the
/// external writer left in the pipe. Returns trimmed text.
fn drain_to_string(file: &mut File) -> String {
    let _ = file.seek(SeekFrom::Start(0));

    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) => {
                debug!(error = %err, "fifo read failed");
                break;
            }
        }
    }

    String::from_utf8_lossy(&data).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_without_raising_when_path_is_missing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let missing = Path::new("/nonexistent-dir/runtick.fifo");
        assert!(FifoChannel::connect(missing, tx).is_err());
    }

    #[tokio::test]
    async fn connect_never_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-there.fifo");

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(FifoChannel::connect(&path, tx).is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_appends_newline_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chan");
        std::fs::write(&path, b"").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let channel = FifoChannel::connect(&path, tx).unwrap();
        channel.write("ping");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "ping\n");
    }

    #[test]
    fn suppression_counter_consumes_once_per_write() {
        let counter = AtomicU64::new(0);
        assert!(!consume_suppression(&counter));

        counter.fetch_add(1, Ordering::SeqCst);
        assert!(consume_suppression(&counter));
        assert!(!consume_suppression(&counter));
    }

    #[test]
    fn drain_reads_regular_files_from_the_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chan");
        std::fs::write(&path, b"  hello from outside \n").unwrap();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)
            .unwrap();

        assert_eq!(drain_to_string(&mut file), "hello from outside");
        // A second drain re-reads the same regular file contents.
        assert_eq!(drain_to_string(&mut file), "hello from outside");
    }
}
