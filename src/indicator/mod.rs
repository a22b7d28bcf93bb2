//! # Indicator Actuation
//!
//! The consuming side of the marker datagrams: LEDs that blink on bass hits.
//!
//! ## Key Components:
//! - **Indicator**: capability interface (`turn_on`, `turn_off`, `toggle`, `pulse`)
//! - **RateLimited**: debounces any indicator on the monotonic clock
//! - **leds**: sysfs LED class devices and the embedded-controller LED
//! - **listener**: UDP receive loop behind the `listen` command

pub mod leds;
pub mod listener;

use crate::config::IndicatorSettings;
use anyhow::{Context, Result};
use std::io;
use std::time::{Duration, Instant};
use tracing::info;

/// Something that can show a binary visual state.
pub trait Indicator: Send {
    fn name(&self) -> String;

    fn turn_on(&mut self) -> io::Result<()>;

    fn turn_off(&mut self) -> io::Result<()>;

    fn toggle(&mut self) -> io::Result<()>;

    /// Reaction to one marker event. Toggles unless the device has something
    /// better to show.
    fn pulse(&mut self) -> io::Result<()> {
        self.toggle()
    }
}

/// Drops triggers that arrive less than `min_interval` after the last one
/// that went through.
///
/// Uses `Instant`, so wall-clock adjustments cannot stall or burst the LED.
pub struct RateLimited {
    inner: Box<dyn Indicator>,
    min_interval: Duration,
    last_fired: Option<Instant>,
}

impl RateLimited {
    pub fn new(inner: Box<dyn Indicator>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_fired: None,
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    /// Pulse the indicator if the debounce interval has elapsed.
    ///
    /// Returns whether it fired. A failed write does not start a new interval.
    pub fn trigger(&mut self) -> io::Result<bool> {
        self.trigger_at(Instant::now())
    }

    pub fn trigger_at(&mut self, now: Instant) -> io::Result<bool> {
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.min_interval {
                return Ok(false);
            }
        }

        self.inner.pulse()?;
        self.last_fired = Some(now);
        Ok(true)
    }
}

/// Build every indicator enabled in the settings, each switched off and
/// wrapped in its own debouncer.
pub fn build_indicators(settings: &IndicatorSettings) -> Result<Vec<RateLimited>> {
    let interval = Duration::from_millis(settings.min_interval_ms);
    let mut indicators = Vec::new();

    if !settings.sysfs_leds.is_empty() {
        let led = leds::SysfsLed::from_names(&settings.sysfs_leds)
            .context("Failed to initialise sysfs LEDs")?;
        indicators.push(RateLimited::new(Box::new(led), interval));
    }

    if settings.ec_enabled {
        let led = leds::EcLed::new(&settings.ec_path, settings.ec_offset)
            .with_context(|| format!("Failed to initialise EC LED at {}", settings.ec_path))?;
        indicators.push(RateLimited::new(Box::new(led), interval));
    }

    for indicator in &indicators {
        info!(indicator = %indicator.name(), interval_ms = settings.min_interval_ms, "Indicator ready");
    }

    Ok(indicators)
}
