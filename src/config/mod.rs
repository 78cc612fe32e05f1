//! Configuration management
//!
//! Loads fastlane.toml; every option has a built-in default, so a missing
//! file or a partial file both work.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, Diagnostic, Severity, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: Config = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file does not exist.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    if path.as_ref().exists() {
        load(path)
    } else {
        Ok(Config::default())
    }
}
