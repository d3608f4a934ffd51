//! `powermate-watch`: logs every gesture from a Griffin PowerMate.
//!
//! Usage: `powermate-watch [CONFIG_PATH]`
//!
//! Without an argument the platform config file is used (defaults apply when
//! it does not exist).  Turning the knob while it is held picks an LED
//! brightness, which is applied once the run ends; holding the button for
//! more than a second and releasing it ends the program, as does Ctrl-C.
//!
//! The handler never answers a gesture with an LED command.  Some kernels
//! echo written `Misc` records back to readers, and an echoed record ends
//! the run with `EventNotImplemented`, so all LED writes here happen outside
//! the run.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config            -- argv[1] or platform path
//!  └─ PowerMate::open()      -- EVIOCGNAME check, then the duplex stream
//!  └─ pulse the LED
//!  └─ spawn Ctrl-C watcher   -- StopHandle::stop()
//!  └─ PowerMate::run(WatchHandler)
//!  └─ illuminate(chosen brightness)
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use powermate::infrastructure::storage::config::{self, PowerMateConfig};
use powermate::{Event, PowerMateHandler};

/// A release held at least this long ends the program.
const LONG_PRESS_MS: f64 = 1_000.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match std::env::args_os().nth(1) {
        Some(path) => config::load_config_from(&PathBuf::from(path))?,
        None => config::load_config()?,
    };

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.log_level)),
        )
        .init();

    info!(path = %cfg.device.path.display(), "powermate-watch starting");
    watch(cfg).await
}

#[cfg(unix)]
async fn watch(cfg: PowerMateConfig) -> anyhow::Result<()> {
    let knob = powermate::PowerMate::open(&cfg.device, &cfg.timing)?;
    knob.pulse().await?;

    let stop = knob.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                stop.stop();
            }
            Err(e) => warn!("could not listen for Ctrl-C: {e}"),
        }
    });

    let mut handler = WatchHandler::default();
    let stats = knob.run(&mut handler).await?;
    knob.illuminate(handler.brightness_percent).await?;
    info!(
        presses = stats.presses,
        releases = stats.releases,
        twist_releases = stats.twist_releases,
        rotations = stats.rotations,
        ended_by = ?stats.ended_by,
        "powermate-watch finished"
    );
    Ok(())
}

#[cfg(not(unix))]
async fn watch(_cfg: PowerMateConfig) -> anyhow::Result<()> {
    anyhow::bail!("powermate-watch needs a Unix evdev device")
}

/// Logs gestures and tracks a brightness chosen by pressed rotation.
struct WatchHandler {
    brightness_percent: f64,
}

impl Default for WatchHandler {
    fn default() -> Self {
        Self {
            brightness_percent: 50.0,
        }
    }
}

#[async_trait]
impl PowerMateHandler for WatchHandler {
    fn on_start(&mut self) {
        info!("listening for PowerMate events (hold > 1s to quit)");
    }

    fn on_exit(&mut self) {
        info!("no longer listening");
    }

    async fn pressed(&mut self) -> Option<Event> {
        info!("pressed");
        None
    }

    async fn released(&mut self, elapsed_ms: Option<f64>) -> Option<Event> {
        info!(?elapsed_ms, "released");
        match elapsed_ms {
            Some(ms) if ms > LONG_PRESS_MS => Some(Event::stop()),
            _ => None,
        }
    }

    async fn rotated(&mut self, delta: i32, pressed: bool) -> Option<Event> {
        info!(delta, pressed, "rotated");
        if !pressed {
            return None;
        }
        self.brightness_percent = (self.brightness_percent + f64::from(delta)).clamp(0.0, 100.0);
        info!(brightness_percent = self.brightness_percent, "brightness chosen");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pressed_rotation_adjusts_brightness_without_led_reply() {
        // Arrange
        let mut handler = WatchHandler::default();

        // Act
        let reply = handler.rotated(5, true).await;

        // Assert
        assert_eq!(reply, None);
        assert_eq!(handler.brightness_percent, 55.0);
    }

    #[tokio::test]
    async fn test_brightness_is_clamped_and_unpressed_turns_are_ignored() {
        let mut handler = WatchHandler::default();

        assert_eq!(handler.rotated(500, true).await, None);
        assert_eq!(handler.rotated(-3, false).await, None);

        assert_eq!(handler.brightness_percent, 100.0);
    }

    #[tokio::test]
    async fn test_only_a_long_release_stops() {
        let mut handler = WatchHandler::default();

        assert_eq!(handler.released(Some(200.0)).await, None);
        assert_eq!(handler.released(None).await, None);
        assert_eq!(handler.released(Some(1_500.0)).await, Some(Event::stop()));
    }
}
