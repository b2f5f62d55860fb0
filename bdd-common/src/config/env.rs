//! Environment variable parsing with type safety.
//!
//! Collects errors during parsing so every misconfigured variable can be
//! reported at once instead of one per run.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A single misconfigured environment variable.
#[derive(Debug, Error)]
pub enum EnvVarError {
    #[error("required environment variable {0} is not set")]
    Missing(String),

    #[error("invalid value for {var}: expected {expected}, got '{value}'")]
    Invalid {
        var: String,
        expected: &'static str,
        value: String,
    },
}

/// Aggregated configuration failure listing every problem found.
#[derive(Debug)]
pub struct ConfigError {
    pub errors: Vec<EnvVarError>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid suite configuration: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// Type-safe environment variable reader.
pub struct EnvReader {
    errors: Vec<EnvVarError>,
}

impl EnvReader {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Turn the accumulated errors into a result.
    pub fn finish(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                errors: self.errors,
            })
        }
    }

    /// Get a string value with default.
    pub fn get_string(&mut self, name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get a string value that must be present and non-empty.
    pub fn required_string(&mut self, name: &str) -> String {
        match env::var(name) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => {
                self.errors.push(EnvVarError::Missing(name.to_string()));
                String::new()
            }
        }
    }

    /// Get a boolean value with default.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str, default: bool) -> bool {
        match env::var(name) {
            Ok(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    self.errors.push(EnvVarError::Invalid {
                        var: name.to_string(),
                        expected: "boolean (true/false/1/0/yes/no/on/off)",
                        value,
                    });
                    default
                }
            },
            Err(_) => default,
        }
    }

    /// Get a wait budget expressed as whole minutes.
    pub fn get_minutes(&mut self, name: &str, default_minutes: u64) -> Duration {
        match env::var(name) {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(minutes) => Duration::from_secs(minutes * 60),
                Err(_) => {
                    self.errors.push(EnvVarError::Invalid {
                        var: name.to_string(),
                        expected: "whole number of minutes",
                        value,
                    });
                    Duration::from_secs(default_minutes * 60)
                }
            },
            Err(_) => Duration::from_secs(default_minutes * 60),
        }
    }

    /// Get a duration expressed as whole milliseconds.
    pub fn get_millis(&mut self, name: &str, default_millis: u64) -> Duration {
        match env::var(name) {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(millis) => Duration::from_millis(millis),
                Err(_) => {
                    self.errors.push(EnvVarError::Invalid {
                        var: name.to_string(),
                        expected: "whole number of milliseconds",
                        value,
                    });
                    Duration::from_millis(default_millis)
                }
            },
            Err(_) => Duration::from_millis(default_millis),
        }
    }
}

impl Default for EnvReader {
    fn default() -> Self {
        Self::new()
    }
}
