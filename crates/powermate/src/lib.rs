//! powermate library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::dispatch::{
    DispatchError, Dispatcher, PowerMateHandler, RunEnd, RunStats, StopHandle,
};
pub use application::powermate::{PowerMate, PowerMateError};
pub use infrastructure::device::stream::{DuplexStream, Step, StreamError};
pub use powermate_core::{Event, EventKind, LedControlEvent};
