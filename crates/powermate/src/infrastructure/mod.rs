//! Infrastructure layer for the PowerMate driver.
//!
//! Contains OS-facing adapters: the evdev device stream, the identification
//! ioctl, and file-system configuration storage.
//!
//! **Dependency rule**: this layer may depend on `powermate_core`, but MUST
//! NOT import from the `application` layer.

pub mod device;
pub mod storage;
