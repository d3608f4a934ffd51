//! Duplex record stream over a single PowerMate device path.
//!
//! The stream owns two independent handles on the same path: one for reading
//! input records and one for writing LED commands.  It is driven by the
//! dispatcher through [`DuplexStream::step`], which is called once per loop
//! iteration with the previous callback's outgoing event (if any).
//!
//! # What happens in one step (for beginners)
//!
//! ```text
//! step(outgoing)
//!  ├─ outgoing is Stop?      → mark stopped, return Step::Stopped
//!  ├─ outgoing is an event?  → encode + write + flush
//!  ├─ < 1 record buffered?   → read (bounded by read_timeout)
//!  └─ ≥ 1 record buffered?   → decode, trim buffer, return Step::Received
//!                              otherwise return Step::Pending
//! ```
//!
//! Partial reads are kept in an internal buffer until a whole record has
//! arrived, so a record split across two reads still decodes correctly.
//!
//! # Non-blocking reads
//!
//! On a real device the read handle is opened with `O_NONBLOCK` and
//! registered with the Tokio reactor via [`AsyncFd`].  Each read attempt is
//! additionally wrapped in a timeout, so a quiet knob never prevents the
//! dispatcher from reaching its cancellation check.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use powermate_core::{decode, encode, DecodeError, Event, EventKind, RECORD_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

#[cfg(unix)]
pub use self::unix::{DeviceReader, DeviceStream};

/// Default upper bound on a single read attempt.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Error type for stream I/O.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The device went away (the kernel reported `ENODEV`), typically because
    /// the knob was unplugged mid-run.
    #[error("PowerMate disconnected: {}", path.display())]
    DeviceDisconnected { path: PathBuf },

    /// Any other I/O failure on the read or write handle.
    #[error("device I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of one [`DuplexStream::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A complete record was read and decoded.
    Received(Event),
    /// No complete record is available yet.
    Pending,
    /// A stop event was received; the stream is finished.
    Stopped,
}

/// Bidirectional record transport over one device path.
pub struct DuplexStream<R, W> {
    path: PathBuf,
    reader: R,
    writer: W,
    /// Bytes read but not yet decoded.  Holds less than two records.
    buffer: Vec<u8>,
    read_timeout: Duration,
    stopped: bool,
}

impl<R, W> DuplexStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an already-open reader/writer pair.
    ///
    /// `path` is only used for diagnostics and error reporting.
    pub fn new(path: impl Into<PathBuf>, reader: R, writer: W) -> Self {
        Self {
            path: path.into(),
            reader,
            writer,
            buffer: Vec::with_capacity(2 * RECORD_SIZE),
            read_timeout: DEFAULT_READ_TIMEOUT,
            stopped: false,
        }
    }

    /// Sets the upper bound on a single read attempt.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// The device path this stream was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` once a stop event has been processed.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Writes one event to the device and flushes it immediately.
    ///
    /// `None` and `Null`-kind events are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::DeviceDisconnected`] if the device is gone, or
    /// [`StreamError::Io`] for any other write failure.
    pub async fn send(&mut self, event: Option<Event>) -> Result<(), StreamError> {
        let Some(evt) = event else {
            return Ok(());
        };
        if evt.kind == EventKind::Null {
            return Ok(());
        }

        debug!(?evt, "sending event");
        let record = encode(&evt);
        self.writer
            .write_all(&record)
            .await
            .map_err(|e| classify_io_error(&self.path, e))?;
        self.writer
            .flush()
            .await
            .map_err(|e| classify_io_error(&self.path, e))?;
        Ok(())
    }

    /// Advances the stream by one cycle.
    ///
    /// A `Stop` outgoing event ends the stream without being written; every
    /// later call returns [`Step::Stopped`].  Any other outgoing event is
    /// written before the read so the device sees it as soon as possible.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::DeviceDisconnected`] when the kernel reports the
    /// device as removed, or [`StreamError::Io`] for other I/O failures.
    /// Undecodable records are logged and skipped, never returned as errors.
    pub async fn step(&mut self, outgoing: Option<Event>) -> Result<Step, StreamError> {
        if self.stopped {
            return Ok(Step::Stopped);
        }

        if let Some(evt) = outgoing {
            if evt.kind == EventKind::Stop {
                info!(path = %self.path.display(), "received an event to stop the stream");
                self.stopped = true;
                return Ok(Step::Stopped);
            }
            self.send(Some(evt)).await?;
        }

        if self.buffer.len() < RECORD_SIZE {
            self.fill_buffer().await?;
        }

        Ok(match self.take_record() {
            Some(evt) => Step::Received(evt),
            None => Step::Pending,
        })
    }

    /// Performs at most one bounded read and appends the bytes to the buffer.
    async fn fill_buffer(&mut self) -> Result<(), StreamError> {
        // evdev rejects reads shorter than one record, so always offer a
        // full record's worth of space.
        let mut scratch = [0u8; RECORD_SIZE];

        match tokio::time::timeout(self.read_timeout, self.reader.read(&mut scratch)).await {
            Err(_elapsed) => {
                trace!("no data within read timeout");
                Ok(())
            }
            Ok(Ok(0)) => {
                trace!("read returned no bytes");
                Ok(())
            }
            Ok(Ok(n)) => {
                self.buffer.extend_from_slice(&scratch[..n]);
                Ok(())
            }
            Ok(Err(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Ok(Err(e)) => Err(classify_io_error(&self.path, e)),
        }
    }

    /// Decodes and removes the first buffered record, if there is one.
    fn take_record(&mut self) -> Option<Event> {
        if self.buffer.len() < RECORD_SIZE {
            return None;
        }

        let mut record = [0u8; RECORD_SIZE];
        record.copy_from_slice(&self.buffer[..RECORD_SIZE]);
        self.buffer.drain(..RECORD_SIZE);

        match decode(&record) {
            Ok(evt) => {
                debug!(?evt, "received event");
                Some(evt)
            }
            Err(DecodeError::InvalidKind(kind)) => {
                warn!(kind, "unrecognized event kind; record skipped");
                None
            }
        }
    }
}

/// Maps `ENODEV` to [`StreamError::DeviceDisconnected`]; everything else
/// passes through unchanged.
fn classify_io_error(path: &Path, err: io::Error) -> StreamError {
    if err.raw_os_error() == Some(libc::ENODEV) {
        StreamError::DeviceDisconnected {
            path: path.to_path_buf(),
        }
    } else {
        StreamError::Io(err)
    }
}

// ── Real device handles ───────────────────────────────────────────────────────

#[cfg(unix)]
mod unix {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Seek, SeekFrom};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::Path;
    use std::pin::Pin;
    use std::task::{ready, Context, Poll};

    use tokio::io::unix::AsyncFd;
    use tokio::io::{AsyncRead, ReadBuf};
    use tracing::{debug, info};

    use super::{classify_io_error, DuplexStream, StreamError};

    /// A [`DuplexStream`] over a real character device.
    pub type DeviceStream = DuplexStream<DeviceReader, tokio::fs::File>;

    /// Non-blocking read handle registered with the Tokio reactor.
    pub struct DeviceReader {
        inner: AsyncFd<File>,
    }

    impl DeviceReader {
        /// Registers an already-open, non-blocking file with the reactor.
        ///
        /// Must be called from within a Tokio runtime.
        pub fn new(file: File) -> io::Result<Self> {
            Ok(Self {
                inner: AsyncFd::new(file)?,
            })
        }
    }

    impl AsyncRead for DeviceReader {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            loop {
                let mut guard = ready!(self.inner.poll_read_ready(cx))?;
                let unfilled = buf.initialize_unfilled();
                match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                    Ok(Ok(len)) => {
                        buf.advance(len);
                        return Poll::Ready(Ok(()));
                    }
                    Ok(Err(err)) => return Poll::Ready(Err(err)),
                    Err(_would_block) => continue,
                }
            }
        }
    }

    impl DeviceStream {
        /// Opens the read and write handles on `path`.
        ///
        /// The read handle is positioned at end-of-stream so no backlog is
        /// replayed.  Character devices that refuse to seek have no backlog
        /// to skip and are accepted as-is.
        ///
        /// Must be called from within a Tokio runtime.
        ///
        /// # Errors
        ///
        /// Returns [`StreamError::DeviceDisconnected`] if the device node
        /// exists but the device is gone, or [`StreamError::Io`] if either
        /// handle cannot be opened.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
            let path = path.as_ref();

            let mut read_handle = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
                .map_err(|e| classify_io_error(path, e))?;

            match read_handle.seek(SeekFrom::End(0)) {
                Ok(_) => {}
                Err(e) if e.raw_os_error() == Some(libc::ESPIPE) => {
                    debug!(path = %path.display(), "device is not seekable; nothing to skip");
                }
                Err(e) => return Err(classify_io_error(path, e)),
            }

            let write_handle = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| classify_io_error(path, e))?;

            let reader = DeviceReader::new(read_handle)?;
            info!(path = %path.display(), "opened PowerMate device stream");
            Ok(DuplexStream::new(
                path,
                reader,
                tokio::fs::File::from_std(write_handle),
            ))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
