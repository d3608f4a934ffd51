//! Device identification via the evdev `EVIOCGNAME` ioctl.
//!
//! Every evdev node can report the human-readable name of the hardware behind
//! it.  Before streaming from a path we ask for that name and refuse to
//! continue unless it contains the expected identifier (by default
//! `"Griffin PowerMate"`).  This catches the common mistake of pointing the
//! driver at the wrong `/dev/input/event*` node, which would otherwise fail
//! much later with confusing decode warnings.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Substring the kernel-reported name must contain.
pub const DEFAULT_DEVICE_NAME: &str = "Griffin PowerMate";

/// Size of the buffer handed to `EVIOCGNAME`.
const NAME_BUFFER_LEN: usize = 255;

/// `EVIOCGNAME(len)` = `_IOC(_IOC_READ, 'E', 0x06, len)`.
const fn eviocgname(len: usize) -> u32 {
    const IOC_READ: u32 = 2;
    (IOC_READ << 30) | ((len as u32) << 16) | ((b'E' as u32) << 8) | 0x06
}

/// Request code for a [`NAME_BUFFER_LEN`]-byte name query.
pub const EVIOCGNAME: u32 = eviocgname(NAME_BUFFER_LEN);

/// Error type for device identification.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The device answered, but with the wrong name.
    #[error("{} is not a {expected} (device reports {name:?})", path.display())]
    NameMismatch {
        path: PathBuf,
        name: String,
        expected: String,
    },

    /// The device could not be opened or did not answer the name query.
    #[error("could not query the device name of {}: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Confirms that `path` is a device whose name contains `expected`.
///
/// Returns the full device name on success.
///
/// # Errors
///
/// Returns [`IdentifyError::Probe`] if the name cannot be read, or
/// [`IdentifyError::NameMismatch`] if it does not contain `expected`.
pub fn verify_device(path: &Path, expected: &str) -> Result<String, IdentifyError> {
    let name = read_device_name(path).map_err(|source| IdentifyError::Probe {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), %name, "device reported its name");

    if name_matches(&name, expected) {
        Ok(name)
    } else {
        Err(IdentifyError::NameMismatch {
            path: path.to_path_buf(),
            name,
            expected: expected.to_string(),
        })
    }
}

/// Returns `true` if the reported `name` contains `expected`.
pub fn name_matches(name: &str, expected: &str) -> bool {
    name.contains(expected)
}

/// Asks the kernel for the name of the evdev device at `path`.
///
/// # Errors
///
/// Returns the underlying I/O error if the path cannot be opened or the
/// ioctl fails (e.g. the path is a regular file, not an evdev node).
#[cfg(target_os = "linux")]
pub fn read_device_name(path: &Path) -> io::Result<String> {
    use std::fs::OpenOptions;
    use std::os::fd::AsRawFd;

    let file = OpenOptions::new().read(true).open(path)?;
    let mut buf = [0u8; NAME_BUFFER_LEN];

    // SAFETY: EVIOCGNAME writes at most NAME_BUFFER_LEN bytes into `buf`,
    // which is exclusively borrowed and outlives the call.  The fd is valid
    // for as long as `file` is alive.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), EVIOCGNAME as _, buf.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(parse_device_name(&buf))
}

/// Non-Linux hosts have no evdev; identification always fails.
#[cfg(not(target_os = "linux"))]
pub fn read_device_name(_path: &Path) -> io::Result<String> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "evdev device identification requires Linux",
    ))
}

/// Converts the NUL-padded ioctl buffer into a string.
fn parse_device_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviocgname_matches_kernel_request_code() {
        assert_eq!(EVIOCGNAME, 0x80ff_4506);
    }

    #[test]
    fn test_parse_device_name_strips_nul_padding() {
        // Arrange
        let mut raw = [0u8; NAME_BUFFER_LEN];
        let name = b"Griffin PowerMate";
        raw[..name.len()].copy_from_slice(name);

        // Act / Assert
        assert_eq!(parse_device_name(&raw), "Griffin PowerMate");
    }

    #[test]
    fn test_parse_device_name_handles_unterminated_buffer() {
        assert_eq!(parse_device_name(b"abc"), "abc");
    }

    #[test]
    fn test_name_matches_requires_substring() {
        assert!(name_matches("Griffin PowerMate", DEFAULT_DEVICE_NAME));
        assert!(name_matches("Griffin Technology, Inc. Griffin PowerMate", DEFAULT_DEVICE_NAME));
        assert!(!name_matches("AT Translated Set 2 keyboard", DEFAULT_DEVICE_NAME));
        assert!(!name_matches("", DEFAULT_DEVICE_NAME));
    }

    #[test]
    fn test_verify_device_reports_probe_failure_for_missing_path() {
        // Act
        let err = verify_device(Path::new("/nonexistent/powermate"), DEFAULT_DEVICE_NAME)
            .expect_err("missing path must not be recognized");

        // Assert
        assert!(matches!(err, IdentifyError::Probe { .. }), "got {err:?}");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_verify_device_rejects_regular_file() {
        // A regular file opens fine but does not answer EVIOCGNAME.
        let err = verify_device(Path::new("/proc/self/status"), DEFAULT_DEVICE_NAME)
            .expect_err("regular file is not an evdev node");

        assert!(matches!(err, IdentifyError::Probe { .. }), "got {err:?}");
    }
}
