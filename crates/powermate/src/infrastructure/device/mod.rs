//! Device access for the PowerMate character device.
//!
//! - [`stream`] owns the read and write handles and turns bytes into events.
//! - [`identify`] asks the kernel for the device name before anything is
//!   opened for streaming, so a wrong path fails fast.
//!
//! # Testability
//!
//! [`stream::DuplexStream`] is generic over any `AsyncRead`/`AsyncWrite`
//! pair, so tests drive it with scripted in-memory I/O instead of a real
//! `/dev/input/event*` node.

pub mod identify;
pub mod stream;
