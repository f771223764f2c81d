//! Engine configuration, loadable from JSON.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, Error};
use crate::model::Rule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Broadcast buffer size of the event bus.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Nested dispatch depth at which a warning is logged. Dispatch is not
    /// aborted; the warning exists to surface rules that trigger each other
    /// in a loop.
    #[serde(default = "default_reentrancy_warn_depth")]
    pub reentrancy_warn_depth: usize,

    /// Rules registered at engine construction.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
            reentrancy_warn_depth: default_reentrancy_warn_depth(),
            rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &str) -> EngineResult<Self> {
        from_file(path)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> EngineResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> EngineResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub(crate) fn default_event_buffer_size() -> usize {
    1000
}

fn default_reentrancy_warn_depth() -> usize {
    8
}
