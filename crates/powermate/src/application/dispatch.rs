//! Dispatcher: turns raw PowerMate events into semantic callbacks.
//!
//! This is the heart of the driver.  It pulls decoded events from the
//! [`DuplexStream`], classifies them against the current press/rotation state,
//! invokes the matching [`PowerMateHandler`] callback, and feeds the
//! callback's return value back into the stream on the next cycle.
//!
//! # Classification rules
//!
//! | event            | state change                                   | callback                 |
//! |------------------|------------------------------------------------|--------------------------|
//! | Push, value ≠ 0  | pressed, rotation cleared, press time recorded | `pressed()`              |
//! | Push, value = 0  | released                                       | `released(elapsed)`      |
//! | Push, value = 0 after a rotate | released                         | none (twist-release)     |
//! | Rotate           | rotation flag set                              | `rotated(delta, pressed)`|
//! | Null             | none                                           | none                     |
//! | anything else    | run ends with [`DispatchError::EventNotImplemented`] | none               |
//!
//! # Loop termination
//!
//! The loop ends when a callback returns [`Event::stop`], or when a
//! [`StopHandle`] is triggered from outside.  Either way a drop guard clears
//! the running flag and logs the shutdown exactly once, including when the
//! run ends in an error or the future is dropped mid-await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use powermate_core::{Event, EventKind};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, trace, warn};

use crate::infrastructure::device::stream::{DuplexStream, Step, StreamError};

/// Default cooperative pause between loop iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Error type for the dispatch loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A decodable event of a kind the classifier has no rule for reached the
    /// dispatcher (e.g. a `Misc` record echoed by the device).
    #[error("event not implemented: {0:?}")]
    EventNotImplemented(Event),

    /// The underlying stream failed (including device disconnects).
    #[error(transparent)]
    Stream(#[from] StreamError),
}

// ── Callback interface ────────────────────────────────────────────────────────

/// Callbacks an application implements to react to the knob.
///
/// Every method has a default that only logs, so an implementation overrides
/// just the gestures it cares about.  Returning `Some(event)` from a gesture
/// callback writes that event to the device before the next read; returning
/// [`Event::stop`] ends the run.
#[async_trait]
pub trait PowerMateHandler: Send {
    /// Runs once, immediately before the loop starts.
    fn on_start(&mut self) {}

    /// Runs once, immediately after the loop ends (on every exit path).
    fn on_exit(&mut self) {}

    /// The button went down.
    async fn pressed(&mut self) -> Option<Event> {
        debug!("PowerMate pressed");
        None
    }

    /// The button came up without any rotation during the press.
    ///
    /// `elapsed_ms` is how long the button was held, or `None` if no matching
    /// press was seen.  Not called for a twist-release (press, rotate,
    /// release); that gesture is reported only through [`rotated`].
    ///
    /// [`rotated`]: PowerMateHandler::rotated
    async fn released(&mut self, elapsed_ms: Option<f64>) -> Option<Event> {
        debug!(?elapsed_ms, "PowerMate released");
        None
    }

    /// The knob turned by `delta` steps; `pressed` is the button state.
    async fn rotated(&mut self, delta: i32, pressed: bool) -> Option<Event> {
        debug!(delta, pressed, "PowerMate rotated");
        None
    }
}

// ── Classifier ────────────────────────────────────────────────────────────────

/// The semantic meaning of one raw event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Pressed,
    Released { elapsed_ms: Option<f64> },
    /// A release that followed a rotation during the same press.
    TwistReleased,
    Rotated { delta: i32, pressed: bool },
    /// Nothing to report (sync markers).
    Idle,
}

/// Per-run press/rotation state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassifierState {
    pub is_pressed: bool,
    pub rotated_since_press: bool,
    /// Timestamp of the current press in milliseconds, from the event itself.
    pub press_started_at: Option<f64>,
}

impl ClassifierState {
    /// Clears all state left over from a previous run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Updates the state for `evt` and returns what it means.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EventNotImplemented`] for `Misc` and `Stop`
    /// events, which never carry user input.
    pub fn classify(&mut self, evt: &Event) -> Result<Gesture, DispatchError> {
        match evt.kind {
            EventKind::Push if evt.value != 0 => {
                self.is_pressed = true;
                self.rotated_since_press = false;
                self.press_started_at = Some(evt.timestamp_ms());
                Ok(Gesture::Pressed)
            }
            EventKind::Push => {
                self.is_pressed = false;
                let started = self.press_started_at.take();

                if self.rotated_since_press {
                    return Ok(Gesture::TwistReleased);
                }

                let elapsed_ms = match started {
                    Some(t) => Some(evt.timestamp_ms() - t),
                    None => {
                        error!(?evt, "saw a release event without a pressed event");
                        None
                    }
                };
                Ok(Gesture::Released { elapsed_ms })
            }
            EventKind::Rotate => {
                self.rotated_since_press = true;
                Ok(Gesture::Rotated {
                    delta: evt.value,
                    pressed: self.is_pressed,
                })
            }
            EventKind::Null => Ok(Gesture::Idle),
            EventKind::Misc | EventKind::Stop => {
                warn!(?evt, "unrecognized event");
                Err(DispatchError::EventNotImplemented(*evt))
            }
        }
    }
}

// ── Run bookkeeping ───────────────────────────────────────────────────────────

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunEnd {
    /// A callback returned [`Event::stop`].
    #[default]
    Stopped,
    /// A [`StopHandle`] was triggered.
    Cancelled,
}

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// `pressed()` invocations.
    pub presses: u64,
    /// `released()` invocations.
    pub releases: u64,
    /// Releases suppressed because the knob turned during the press.
    pub twist_releases: u64,
    /// `rotated()` invocations.
    pub rotations: u64,
    pub ended_by: RunEnd,
}

/// Cloneable handle that asks a running dispatcher to stop.
///
/// The request is observed at the top of the next loop iteration.  A request
/// made while no run is active is held until the next run observes it.
#[derive(Debug, Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Clears the run flags when the loop exits, however it exits.
struct RunGuard {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        info!("stopping the event loop");
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// The stateful run loop.
pub struct Dispatcher<R, W> {
    stream: DuplexStream<R, W>,
    state: ClassifierState,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl<R, W> Dispatcher<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a dispatcher that exclusively owns `stream`.
    pub fn new(stream: DuplexStream<R, W>) -> Self {
        Self {
            stream,
            state: ClassifierState::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the cooperative pause between loop iterations.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns a handle that can stop the loop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            requested: Arc::clone(&self.stop_requested),
        }
    }

    /// Returns `true` while [`run`](Self::run) is executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared view of the running flag, for owners that cannot borrow the
    /// dispatcher while it runs.
    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn path(&self) -> &std::path::Path {
        self.stream.path()
    }

    /// Direct access to the stream, used for out-of-loop LED commands.
    pub fn stream_mut(&mut self) -> &mut DuplexStream<R, W> {
        &mut self.stream
    }

    /// The current classifier state (reset at the start of every run).
    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Runs the dispatch loop until a callback returns [`Event::stop`], a
    /// [`StopHandle`] fires, or an error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EventNotImplemented`] when an unhandled event
    /// kind arrives, or [`DispatchError::Stream`] for transport failures such
    /// as the device being unplugged.
    pub async fn run<H>(&mut self, handler: &mut H) -> Result<RunStats, DispatchError>
    where
        H: PowerMateHandler + ?Sized,
    {
        self.state.reset();
        self.running.store(true, Ordering::SeqCst);
        let _guard = RunGuard {
            running: Arc::clone(&self.running),
            stop_requested: Arc::clone(&self.stop_requested),
        };
        info!(path = %self.stream.path().display(), "PowerMate event loop started");

        let mut stats = RunStats::default();
        let mut outgoing: Option<Event> = None;

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("external stop requested");
                // A reply the last callback produced still reaches the device.
                if let Some(reply) = outgoing.take().filter(|e| e.kind != EventKind::Stop) {
                    self.stream.send(Some(reply)).await?;
                }
                stats.ended_by = RunEnd::Cancelled;
                return Ok(stats);
            }

            tokio::time::sleep(self.poll_interval).await;

            // Send any response from the previous event back to the stream.
            trace!("waiting for event from PowerMate");
            let evt = match self.stream.step(outgoing.take()).await? {
                Step::Received(evt) => evt,
                Step::Pending => continue,
                Step::Stopped => {
                    stats.ended_by = RunEnd::Stopped;
                    return Ok(stats);
                }
            };

            outgoing = match self.state.classify(&evt)? {
                Gesture::Pressed => {
                    stats.presses += 1;
                    handler.pressed().await
                }
                Gesture::Released { elapsed_ms } => {
                    stats.releases += 1;
                    handler.released(elapsed_ms).await
                }
                Gesture::TwistReleased => {
                    debug!("release after rotation; release callback suppressed");
                    stats.twist_releases += 1;
                    None
                }
                Gesture::Rotated { delta, pressed } => {
                    stats.rotations += 1;
                    handler.rotated(delta, pressed).await
                }
                Gesture::Idle => None,
            };
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
