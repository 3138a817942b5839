//! Environment variable parsing with type safety.
//!
//! Every getter returns `None` when the variable is unset, so callers can
//! overlay only what the environment actually provides. Invalid values are
//! collected instead of aborting, so all issues can be reported at once.

use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Type-safe environment variable parser.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser reading `TMSYNC_*` from the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Parser reading from a custom source.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        Self {
            prefix: "TMSYNC_",
            lookup: Box::new(lookup),
            errors: Vec::new(),
        }
    }

    /// Parser reading from a fixed map (tests).
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self::with_lookup(move |name| vars.get(name).cloned())
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Read an unprefixed variable (e.g. `HTTP_PROXY`).
    pub fn get_raw(&self, var_name: &str) -> Option<String> {
        (self.lookup)(var_name)
    }

    /// Get a string value; empty strings count as unset.
    pub fn get_string(&mut self, name: &str) -> Option<String> {
        self.get_raw(&self.var_name(name))
            .filter(|value| !value.trim().is_empty())
    }

    /// Get a boolean value.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str) -> Option<bool> {
        let var_name = self.var_name(name);
        let value = self.get_raw(&var_name)?;
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a u32 value with range validation.
    pub fn get_u32_range(&mut self, name: &str, min: u32, max: u32) -> Option<u32> {
        let var_name = self.var_name(name);
        let value = self.get_raw(&var_name)?;
        match value.trim().parse::<u32>() {
            Ok(n) if n >= min && n <= max => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 32-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a u64 value with range validation.
    pub fn get_u64_range(&mut self, name: &str, min: u64, max: u64) -> Option<u64> {
        let var_name = self.var_name(name);
        let value = self.get_raw(&var_name)?;
        match value.trim().parse::<u64>() {
            Ok(n) if n >= min && n <= max => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a comma-separated list, trimming entries and dropping empties.
    pub fn get_list(&mut self, name: &str) -> Option<Vec<String>> {
        self.get_string(name).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
