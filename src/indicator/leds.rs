//! LED backends.
//!
//! - [`SysfsLed`]: LED class devices, `/sys/class/leds/<name>/brightness`
//! - [`EcLed`]: a single byte register in the embedded controller's debugfs
//!   file (ThinkPad lid logo dot), needs `ec_sys` loaded with `write_support=1`

use crate::indicator::Indicator;
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;

const EC_LED_ON: u8 = 0x0a;
const EC_LED_OFF: u8 = 0x8a;
const EC_LED_FADE: u8 = 0xaa;

/// One or more sysfs LEDs switched together.
pub struct SysfsLed {
    paths: Vec<PathBuf>,
    lit: bool,
}

impl SysfsLed {
    /// LEDs by class device name, e.g. `platform::mute`, `input3::capslock`.
    pub fn from_names(names: &[String]) -> io::Result<Self> {
        Self::from_paths(
            names
                .iter()
                .map(|name| PathBuf::from(format!("/sys/class/leds/{}/brightness", name)))
                .collect(),
        )
    }

    /// LEDs by brightness file path. All of them are switched off first.
    pub fn from_paths(paths: Vec<PathBuf>) -> io::Result<Self> {
        let mut led = Self { paths, lit: false };
        led.turn_off()?;
        Ok(led)
    }

    fn write_all(&self, value: &str) -> io::Result<()> {
        for path in &self.paths {
            fs::write(path, value)?;
        }
        Ok(())
    }
}

impl Indicator for SysfsLed {
    fn name(&self) -> String {
        let names: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("sysfs[{}]", names.join(", "))
    }

    fn turn_on(&mut self) -> io::Result<()> {
        self.write_all("1")?;
        self.lit = true;
        Ok(())
    }

    fn turn_off(&mut self) -> io::Result<()> {
        self.write_all("0")?;
        self.lit = false;
        Ok(())
    }

    fn toggle(&mut self) -> io::Result<()> {
        if self.lit {
            self.turn_off()
        } else {
            self.turn_on()
        }
    }
}

/// Embedded-controller LED driven through raw byte writes at a fixed offset.
pub struct EcLed {
    path: PathBuf,
    offset: u64,
    lit: bool,
}

impl EcLed {
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> io::Result<Self> {
        let mut led = Self {
            path: path.into(),
            offset,
            lit: false,
        };
        led.turn_off()?;
        Ok(led)
    }

    fn write_byte(&self, value: u8) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        file.write_all(&[value])
    }
}

impl Indicator for EcLed {
    fn name(&self) -> String {
        format!("ec[{}@{}]", self.path.display(), self.offset)
    }

    fn turn_on(&mut self) -> io::Result<()> {
        self.write_byte(EC_LED_ON)?;
        self.lit = true;
        Ok(())
    }

    fn turn_off(&mut self) -> io::Result<()> {
        self.write_byte(EC_LED_OFF)?;
        self.lit = false;
        Ok(())
    }

    fn toggle(&mut self) -> io::Result<()> {
        if self.lit {
            self.turn_off()
        } else {
            self.turn_on()
        }
    }

    /// Off, then let the controller fade the dot back in.
    fn pulse(&mut self) -> io::Result<()> {
        self.turn_off()?;
        self.write_byte(EC_LED_FADE)
    }
}
