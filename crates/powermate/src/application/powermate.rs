//! `PowerMate` façade: the object an embedding application holds.
//!
//! Wraps a [`Dispatcher`] behind an async mutex and adds the lifecycle around
//! a run:
//!
//! ```text
//! run(handler)
//!  ├─ handler.on_start()
//!  ├─ dispatcher.run(handler)    -- until stop, cancel, or error
//!  └─ handler.on_exit()          -- always, even on error or drop
//! ```
//!
//! LED commands ([`PowerMate::illuminate`], [`PowerMate::pulse`]) write to the
//! device directly and are only legal while no run is active, since the
//! dispatcher owns the stream during a run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use powermate_core::LedControlEvent;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::dispatch::{DispatchError, Dispatcher, PowerMateHandler, RunStats, StopHandle};
use crate::infrastructure::device::identify::IdentifyError;
use crate::infrastructure::device::stream::{DuplexStream, StreamError};

/// Error type for façade operations.
#[derive(Debug, Error)]
pub enum PowerMateError {
    /// An LED command was issued while the event loop owns the device.
    #[error("operation not permitted while the event loop is running")]
    OperationNotPermitted,

    #[error("device not recognized: {0}")]
    DeviceNotRecognized(#[from] IdentifyError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// A PowerMate knob bound to one duplex stream.
pub struct PowerMate<R, W> {
    dispatcher: Mutex<Dispatcher<R, W>>,
    running: Arc<AtomicBool>,
    stop: StopHandle,
    path: PathBuf,
}

/// Calls `on_exit` when dropped, so every way out of a run reaches it.
struct ExitGuard<'a, H: PowerMateHandler + ?Sized>(&'a mut H);

impl<H: PowerMateHandler + ?Sized> Drop for ExitGuard<'_, H> {
    fn drop(&mut self) {
        self.0.on_exit();
    }
}

#[cfg(unix)]
impl PowerMate<crate::infrastructure::device::stream::DeviceReader, tokio::fs::File> {
    /// Identifies and opens the device described by `device`, applying the
    /// loop pacing from `timing`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PowerMateError::DeviceNotRecognized`] when verification is
    /// enabled and the path is not a PowerMate, or [`PowerMateError::Stream`]
    /// if the device cannot be opened.
    pub fn open(
        device: &crate::infrastructure::storage::config::DeviceConfig,
        timing: &crate::infrastructure::storage::config::TimingConfig,
    ) -> Result<Self, PowerMateError> {
        use crate::infrastructure::device::{identify, stream::DeviceStream};

        if device.verify {
            let name = identify::verify_device(&device.path, &device.expected_name)?;
            info!(path = %device.path.display(), %name, "PowerMate identified");
        } else {
            debug!(path = %device.path.display(), "device verification disabled");
        }

        let stream = DeviceStream::open(&device.path)?.with_read_timeout(timing.read_timeout());
        let dispatcher = Dispatcher::new(stream).with_poll_interval(timing.poll_interval());
        Ok(Self::from_dispatcher(dispatcher))
    }
}

impl<R, W> PowerMate<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an already-built stream with default loop pacing.
    pub fn from_stream(stream: DuplexStream<R, W>) -> Self {
        Self::from_dispatcher(Dispatcher::new(stream))
    }

    /// Wraps a configured dispatcher.
    pub fn from_dispatcher(dispatcher: Dispatcher<R, W>) -> Self {
        Self {
            running: dispatcher.running_flag(),
            stop: dispatcher.stop_handle(),
            path: dispatcher.path().to_path_buf(),
            dispatcher: Mutex::new(dispatcher),
        }
    }

    /// Runs the event loop with `handler` until it stops.
    ///
    /// `on_start` is called once before the loop and `on_exit` once after it,
    /// whatever the outcome.  Only one run can be active at a time; a second
    /// concurrent call waits for the first to finish.
    ///
    /// # Errors
    ///
    /// Returns [`PowerMateError::Dispatch`] if the loop fails.  `on_exit` has
    /// already run by the time the error is returned.
    pub async fn run<H>(&self, handler: &mut H) -> Result<RunStats, PowerMateError>
    where
        H: PowerMateHandler + ?Sized,
    {
        let mut dispatcher = self.dispatcher.lock().await;

        handler.on_start();
        let mut guard = ExitGuard(handler);
        let result = dispatcher.run(&mut *guard.0).await;
        drop(guard);

        let stats = result?;
        info!(?stats, "PowerMate run finished");
        Ok(stats)
    }

    /// Sets the LED to a steady brightness, `percent` in `0.0..=100.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PowerMateError::OperationNotPermitted`] while a run is
    /// active, or [`PowerMateError::Stream`] if the write fails.
    pub async fn illuminate(&self, percent: f64) -> Result<(), PowerMateError> {
        self.send_led(LedControlEvent::percent(percent)).await
    }

    /// Starts the LED's built-in pulse animation.
    ///
    /// # Errors
    ///
    /// Same as [`illuminate`](Self::illuminate).
    pub async fn pulse(&self) -> Result<(), PowerMateError> {
        self.send_led(LedControlEvent::pulse()).await
    }

    async fn send_led(&self, led: LedControlEvent) -> Result<(), PowerMateError> {
        if self.is_running() {
            return Err(PowerMateError::OperationNotPermitted);
        }
        // A held lock means a run is starting up even if the flag is not set yet.
        let mut dispatcher = self
            .dispatcher
            .try_lock()
            .map_err(|_| PowerMateError::OperationNotPermitted)?;

        debug!(brightness = led.brightness(), pulse_speed = led.pulse_speed(), "sending LED command");
        dispatcher.stream_mut().send(Some(led.to_event())).await?;
        Ok(())
    }

    /// Returns a handle that stops the running loop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The device path this instance was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use powermate_core::{encode, Event, EventKind};
    use std::time::Duration;
    use tokio_test::io::{Builder, Mock};

    const PATH: &str = "/dev/input/test-powermate";

    fn powermate(reader: Mock, writer: Mock) -> PowerMate<Mock, Mock> {
        let stream = DuplexStream::new(PATH, reader, writer);
        PowerMate::from_dispatcher(Dispatcher::new(stream).with_poll_interval(Duration::ZERO))
    }

    #[derive(Default)]
    struct Lifecycle {
        starts: usize,
        exits: usize,
    }

    #[async_trait]
    impl PowerMateHandler for Lifecycle {
        fn on_start(&mut self) {
            self.starts += 1;
        }

        fn on_exit(&mut self) {
            self.exits += 1;
        }

        async fn pressed(&mut self) -> Option<Event> {
            Some(Event::stop())
        }
    }

    #[tokio::test]
    async fn test_illuminate_writes_percent_record_when_idle() {
        // Arrange
        let expected = encode(&LedControlEvent::percent(50.0).to_event());
        let pm = powermate(Builder::new().build(), Builder::new().write(&expected).build());

        // Act
        let result = pm.illuminate(50.0).await;

        // Assert
        assert!(result.is_ok(), "got {result:?}");
    }

    #[tokio::test]
    async fn test_pulse_writes_pulse_record_when_idle() {
        let expected = encode(&LedControlEvent::pulse().to_event());
        let pm = powermate(Builder::new().build(), Builder::new().write(&expected).build());

        pm.pulse().await.expect("pulse");
    }

    #[tokio::test]
    async fn test_led_command_rejected_while_lock_is_held() {
        // Arrange: simulate a run that has the dispatcher but has not yet
        // raised the running flag.
        let pm = powermate(Builder::new().build(), Builder::new().build());
        let _held = pm.dispatcher.lock().await;

        // Act
        let result = pm.pulse().await;

        // Assert
        assert!(matches!(result, Err(PowerMateError::OperationNotPermitted)));
    }

    #[tokio::test]
    async fn test_run_calls_lifecycle_hooks_once() {
        // Arrange
        let press = Event::new(1, 0, EventKind::Push, 0x100, 1);
        let pm = powermate(Builder::new().read(&encode(&press)).build(), Builder::new().build());
        let mut handler = Lifecycle::default();

        // Act
        let stats = pm.run(&mut handler).await.expect("run");

        // Assert
        assert_eq!(stats.presses, 1);
        assert_eq!((handler.starts, handler.exits), (1, 1));
        assert!(!pm.is_running());
    }

    #[tokio::test]
    async fn test_on_exit_runs_before_error_is_returned() {
        // Arrange
        let misc = LedControlEvent::off().to_event();
        let pm = powermate(Builder::new().read(&encode(&misc)).build(), Builder::new().build());
        let mut handler = Lifecycle::default();

        // Act
        let result = pm.run(&mut handler).await;

        // Assert
        assert!(matches!(
            result,
            Err(PowerMateError::Dispatch(DispatchError::EventNotImplemented(_)))
        ));
        assert_eq!((handler.starts, handler.exits), (1, 1));
    }

    #[tokio::test]
    async fn test_path_is_reported() {
        let pm = powermate(Builder::new().build(), Builder::new().build());
        assert_eq!(pm.path(), Path::new(PATH));
    }
}
