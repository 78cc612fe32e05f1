//! Status LED over sysfs GPIO
//!
//! Two pins (red + green) mix three states: green = healthy, red = stall,
//! both = yellow (a probe is running). Pin export and direction are
//! expected to be set up by the install script; writes to an unexported
//! pin are silently ignored so a headless deployment just runs without
//! the LED.

use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Green,
    Yellow,
    Red,
}

pub struct StatusLed {
    red: PathBuf,
    green: PathBuf,
}

impl StatusLed {
    pub fn new(red_pin: u32, green_pin: u32) -> Self {
        Self {
            red: gpio_value_path(red_pin),
            green: gpio_value_path(green_pin),
        }
    }

    pub fn set(&self, color: LedColor) {
        let (red, green) = match color {
            LedColor::Green => (false, true),
            LedColor::Yellow => (true, true),
            LedColor::Red => (true, false),
        };
        write_pin(&self.red, red);
        write_pin(&self.green, green);
    }

    pub fn off(&self) {
        write_pin(&self.red, false);
        write_pin(&self.green, false);
    }
}

fn gpio_value_path(pin: u32) -> PathBuf {
    PathBuf::from(format!("/sys/class/gpio/gpio{}/value", pin))
}

fn write_pin(path: &PathBuf, on: bool) {
    let _ = fs::write(path, if on { "1" } else { "0" });
}
