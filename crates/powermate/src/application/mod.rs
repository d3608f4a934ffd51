//! Application layer for the PowerMate driver.
//!
//! Contains the event classification/dispatch loop and the [`PowerMate`]
//! façade that embedding applications interact with.  Both depend only on
//! `powermate_core` types and the generic [`DuplexStream`], never on a real
//! device, so they are fully unit-testable.
//!
//! [`PowerMate`]: powermate::PowerMate
//! [`DuplexStream`]: crate::infrastructure::device::stream::DuplexStream

pub mod dispatch;
pub mod powermate;
